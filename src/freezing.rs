//! Freezing (immobility) detection
//!
//! Groups consecutive selected frames whose inter-frame displacement stays
//! below a fixed pixel threshold into candidate episodes. Each still frame
//! (one whose displacement from the frame before it is sub-threshold) adds one
//! frame of duration, so a candidate opens at the first still frame and not at
//! the sample it is measured against. A candidate becomes a
//! [`FreezingEpisode`] only if it lasts at least the configured minimum
//! duration; shorter still runs are treated as tracker jitter and dropped.
//!
//! Freezing is judged on raw pixel movement, independent of tank region.

use crate::config::FreezingConfig;
use crate::types::{FreezingEpisode, PositionSample};
use tracing::{debug, trace};

/// Detector state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreezingState {
    Moving,
    Freezing,
}

/// Candidate still run being accumulated
#[derive(Debug, Clone, Copy)]
struct Candidate {
    start_frame: u64,
    end_frame: u64,
    frame_count: u64,
}

/// Streaming freezing detector over time-ordered selected samples
pub struct FreezingDetector {
    config: FreezingConfig,
    seconds_per_frame: f64,
    state: FreezingState,
    previous: Option<PositionSample>,
    candidate: Option<Candidate>,
    episodes: Vec<FreezingEpisode>,
    discarded: u32,
}

impl FreezingDetector {
    pub fn new(config: FreezingConfig, seconds_per_frame: f64) -> Self {
        Self {
            config,
            seconds_per_frame,
            state: FreezingState::Moving,
            previous: None,
            candidate: None,
            episodes: Vec::new(),
            discarded: 0,
        }
    }

    pub fn state(&self) -> FreezingState {
        self.state
    }

    /// Feed the next sample in frame order
    pub fn update(&mut self, sample: &PositionSample) {
        let Some(previous) = self.previous.replace(*sample) else {
            return;
        };

        // A missing frame breaks the run of consecutive frames
        if previous.frame_index.checked_add(1) != Some(sample.frame_index) {
            self.close_candidate();
            return;
        }

        let displacement = sample.displacement_to(&previous);
        let still = displacement < self.config.threshold_px;
        trace!(frame = sample.frame_index, displacement, still, "freezing step");

        match (self.state, still) {
            (FreezingState::Moving, true) => {
                self.state = FreezingState::Freezing;
                self.candidate = Some(Candidate {
                    start_frame: sample.frame_index,
                    end_frame: sample.frame_index,
                    frame_count: 1,
                });
            }
            (FreezingState::Freezing, true) => {
                if let Some(candidate) = self.candidate.as_mut() {
                    candidate.end_frame = sample.frame_index;
                    candidate.frame_count += 1;
                }
            }
            (FreezingState::Freezing, false) => self.close_candidate(),
            (FreezingState::Moving, false) => {}
        }
    }

    /// Close any open candidate and return all emitted episodes
    pub fn finish(mut self) -> Vec<FreezingEpisode> {
        self.close_candidate();
        debug!(
            episodes = self.episodes.len(),
            discarded = self.discarded,
            "freezing detection finished"
        );
        self.episodes
    }

    fn close_candidate(&mut self) {
        self.state = FreezingState::Moving;
        let Some(candidate) = self.candidate.take() else {
            return;
        };

        let duration = candidate.frame_count as f64 * self.seconds_per_frame;
        if duration >= self.config.min_duration_sec {
            self.episodes.push(FreezingEpisode {
                start_frame: candidate.start_frame,
                end_frame: candidate.end_frame,
                frame_count: candidate.frame_count,
            });
        } else {
            self.discarded += 1;
        }
    }
}

/// Run the detector over a full time-ordered sequence
pub fn detect_freezing(
    samples: &[PositionSample],
    config: FreezingConfig,
    seconds_per_frame: f64,
) -> Vec<FreezingEpisode> {
    let mut detector = FreezingDetector::new(config, seconds_per_frame);
    for sample in samples {
        detector.update(sample);
    }
    detector.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SPF: f64 = 0.1;

    fn config(min_duration_sec: f64) -> FreezingConfig {
        FreezingConfig {
            threshold_px: 2.0,
            min_duration_sec,
        }
    }

    fn still_run(start: u64, n: u64) -> Vec<PositionSample> {
        (start..start + n)
            .map(|f| PositionSample::new(0, f, 40.0, 40.0 + (f % 2) as f64 * 0.5))
            .collect()
    }

    #[test]
    fn test_long_still_run_is_one_full_episode() {
        // 21 samples give 20 still frames: 20 * 0.1 s = 2.0 s, exactly the minimum
        let samples = still_run(0, 21);
        let episodes = detect_freezing(&samples, config(2.0), SPF);

        assert_eq!(
            episodes,
            vec![FreezingEpisode {
                start_frame: 1,
                end_frame: 20,
                frame_count: 20
            }]
        );
        assert!((episodes[0].duration_sec(SPF) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_still_run_just_short_of_minimum_is_discarded() {
        // 20 identical samples are 19 still frames, 1.9 s against a 2.0 s minimum
        let samples: Vec<PositionSample> = (0..20)
            .map(|f| PositionSample::new(0, f, 40.0, 40.0))
            .collect();
        let freezing = FreezingConfig {
            threshold_px: 1.0,
            min_duration_sec: 2.0,
        };
        assert!(detect_freezing(&samples, freezing, SPF).is_empty());
    }

    #[test]
    fn test_duration_is_end_minus_start_frames() {
        let samples = still_run(10, 31);
        let episodes = detect_freezing(&samples, config(0.0), SPF);

        assert_eq!(episodes.len(), 1);
        let episode = episodes[0];
        assert_eq!(episode.start_frame, 11);
        assert_eq!(episode.end_frame, 40);
        assert_eq!(
            episode.frame_count,
            episode.end_frame - episode.start_frame + 1
        );
        assert!((episode.duration_sec(SPF) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_frame_index_at_u64_max_does_not_overflow() {
        let samples = vec![
            PositionSample::new(0, u64::MAX - 2, 1.0, 1.0),
            PositionSample::new(0, u64::MAX - 1, 1.0, 1.0),
            PositionSample::new(0, u64::MAX, 1.0, 1.0),
        ];
        let episodes = detect_freezing(&samples, config(0.0), SPF);

        assert_eq!(episodes.len(), 1);
        assert_eq!(episodes[0].end_frame, u64::MAX);
        assert_eq!(episodes[0].frame_count, 2);
    }

    #[test]
    fn test_moving_animal_never_freezes() {
        let samples: Vec<PositionSample> = (0..50)
            .map(|f| PositionSample::new(0, f, f as f64 * 3.0, 10.0))
            .collect();
        assert!(detect_freezing(&samples, config(0.0), SPF).is_empty());
    }

    #[test]
    fn test_displacement_equal_to_threshold_counts_as_moving() {
        let samples: Vec<PositionSample> = (0..10)
            .map(|f| PositionSample::new(0, f, f as f64 * 2.0, 0.0))
            .collect();
        assert!(detect_freezing(&samples, config(0.0), SPF).is_empty());
    }

    #[test]
    fn test_movement_splits_episodes() {
        let mut samples = still_run(0, 30);
        // Jump away and settle again
        samples.extend((30..60).map(|f| PositionSample::new(0, f, 90.0, 90.0)));

        let episodes = detect_freezing(&samples, config(1.0), SPF);
        assert_eq!(episodes.len(), 2);
        assert_eq!((episodes[0].start_frame, episodes[0].end_frame), (1, 29));
        assert_eq!((episodes[1].start_frame, episodes[1].end_frame), (31, 59));
    }

    #[test]
    fn test_frame_gap_ends_episode() {
        let mut samples = still_run(0, 15);
        samples.extend(still_run(20, 15));

        let episodes = detect_freezing(&samples, config(1.0), SPF);
        assert_eq!(episodes.len(), 2);
        assert_eq!(episodes[0].frame_count, 14);
        assert_eq!(episodes[1].start_frame, 21);
    }

    #[test]
    fn test_state_transitions() {
        let mut detector = FreezingDetector::new(config(0.0), SPF);
        assert_eq!(detector.state(), FreezingState::Moving);

        detector.update(&PositionSample::new(0, 0, 0.0, 0.0));
        assert_eq!(detector.state(), FreezingState::Moving);

        detector.update(&PositionSample::new(0, 1, 0.5, 0.0));
        assert_eq!(detector.state(), FreezingState::Freezing);

        detector.update(&PositionSample::new(0, 2, 20.0, 0.0));
        assert_eq!(detector.state(), FreezingState::Moving);

        let episodes = detector.finish();
        assert_eq!(episodes.len(), 1);
        assert_eq!(episodes[0].frame_count, 1);
    }

    #[test]
    fn test_empty_and_single_sample() {
        assert!(detect_freezing(&[], config(0.0), SPF).is_empty());
        assert!(detect_freezing(&still_run(0, 1), config(0.0), SPF).is_empty());
    }
}
