//! Track selection
//!
//! The upstream tracker may report several overlapping tracks for the single
//! animal in the tank. This module reduces them to exactly one position per
//! frame index through a pluggable [`SelectionStrategy`].

use crate::types::PositionSample;
use std::collections::BTreeMap;
use tracing::debug;

/// Policy choosing one sample among all samples sharing a frame index
pub trait SelectionStrategy {
    /// Pick the sample to keep. `candidates` is never empty.
    fn select(&self, candidates: &[PositionSample]) -> Option<PositionSample>;
}

/// Keep the sample with the highest track id (the most recently created track)
#[derive(Debug, Clone, Copy, Default)]
pub struct HighestTrackId;

impl SelectionStrategy for HighestTrackId {
    fn select(&self, candidates: &[PositionSample]) -> Option<PositionSample> {
        candidates.iter().copied().max_by_key(|s| s.track_id)
    }
}

/// Result of reducing overlapping tracks to one sample per frame
#[derive(Debug, Clone, PartialEq)]
pub struct TrackSelection {
    /// One sample per frame index, ordered by frame index
    pub samples: Vec<PositionSample>,
    /// Frame indices between the first and last selected frame with no sample
    pub gap_frames: u64,
    /// Number of distinct track ids in the input
    pub track_count: usize,
}

/// Track selector applying a strategy frame by frame
pub struct TrackSelector<'a> {
    strategy: &'a dyn SelectionStrategy,
}

impl<'a> TrackSelector<'a> {
    pub fn new(strategy: &'a dyn SelectionStrategy) -> Self {
        Self { strategy }
    }

    /// Select one sample per frame index.
    ///
    /// Frames absent from every track produce no sample; they are counted in
    /// [`TrackSelection::gap_frames`] and excluded from all downstream totals.
    pub fn select(&self, samples: &[PositionSample]) -> TrackSelection {
        let mut by_frame: BTreeMap<u64, Vec<PositionSample>> = BTreeMap::new();
        for sample in samples {
            by_frame.entry(sample.frame_index).or_default().push(*sample);
        }

        let mut track_ids: Vec<i64> = samples.iter().map(|s| s.track_id).collect();
        track_ids.sort_unstable();
        track_ids.dedup();

        let selected: Vec<PositionSample> = by_frame
            .values()
            .filter_map(|candidates| self.strategy.select(candidates))
            .collect();

        let gap_frames = match (selected.first(), selected.last()) {
            // Selected frames are distinct, so len - 1 never exceeds the span
            (Some(first), Some(last)) => {
                (last.frame_index - first.frame_index) - (selected.len() as u64 - 1)
            }
            _ => 0,
        };

        debug!(
            input = samples.len(),
            selected = selected.len(),
            tracks = track_ids.len(),
            gap_frames,
            "selected one sample per frame"
        );

        TrackSelection {
            samples: selected,
            gap_frames,
            track_count: track_ids.len(),
        }
    }
}

/// Select with the default highest-track-id policy
pub fn select_latest_tracks(samples: &[PositionSample]) -> TrackSelection {
    TrackSelector::new(&HighestTrackId).select(samples)
}
