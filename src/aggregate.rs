//! Aggregation of per-frame results into the summary report
//!
//! Region time is frame count times frame duration; frames missing from every
//! track never reach the aggregator and so never count toward any total.

use crate::error::{MetricsError, Result};
use crate::types::{
    ClassifiedSample, DistanceUnit, FreezingEpisode, HalfRegion, RegionBin, RegionShares, Roi,
    SummaryReport, ThirdRegion,
};
use tracing::info;

/// Tolerance absorbing float error when a frame lands exactly on a bin edge
const BIN_EDGE_EPSILON: f64 = 1e-9;

/// Frame counts per region
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct RegionCounts {
    total: u64,
    top_half: u64,
    bottom_half: u64,
    top_third: u64,
    middle_third: u64,
    bottom_third: u64,
}

impl RegionCounts {
    fn add(&mut self, sample: &ClassifiedSample) {
        self.total += 1;
        match sample.half_region {
            HalfRegion::Top => self.top_half += 1,
            HalfRegion::Bottom => self.bottom_half += 1,
        }
        match sample.third_region {
            ThirdRegion::Top => self.top_third += 1,
            ThirdRegion::Middle => self.middle_third += 1,
            ThirdRegion::Bottom => self.bottom_third += 1,
        }
    }

    fn shares(&self) -> RegionShares {
        if self.total == 0 {
            return RegionShares::default();
        }
        let pct = |count: u64| count as f64 / self.total as f64 * 100.0;
        RegionShares {
            top_half_pct: pct(self.top_half),
            bottom_half_pct: pct(self.bottom_half),
            top_third_pct: pct(self.top_third),
            middle_third_pct: pct(self.middle_third),
            bottom_third_pct: pct(self.bottom_third),
        }
    }
}

/// Run-level context the aggregator needs besides the classified frames
#[derive(Debug, Clone, Copy)]
pub struct AggregationContext {
    pub roi: Roi,
    pub distance_unit: DistanceUnit,
    pub seconds_per_frame: f64,
    pub bin_seconds: f64,
    pub gap_frames: u64,
}

impl AggregationContext {
    /// Bins narrower than one frame would leave most of them empty
    pub fn validate(&self) -> Result<()> {
        if self.bin_seconds < self.seconds_per_frame {
            return Err(MetricsError::Configuration(format!(
                "bin width {} s is shorter than one frame ({} s)",
                self.bin_seconds, self.seconds_per_frame
            )));
        }
        Ok(())
    }
}

/// Accumulator producing a [`SummaryReport`]
pub struct Aggregator {
    context: AggregationContext,
    counts: RegionCounts,
    bins: Vec<RegionCounts>,
    distance_sum: f64,
}

impl Aggregator {
    pub fn new(context: AggregationContext) -> Self {
        Self {
            context,
            counts: RegionCounts::default(),
            bins: Vec::new(),
            distance_sum: 0.0,
        }
    }

    /// Add the next classified frame (in frame order)
    pub fn add(&mut self, sample: &ClassifiedSample) {
        // Elapsed time counts only frames that were actually observed
        let elapsed = self.counts.total as f64 * self.context.seconds_per_frame;
        let bin = ((elapsed + BIN_EDGE_EPSILON) / self.context.bin_seconds).floor() as usize;
        if self.bins.len() <= bin {
            self.bins.resize(bin + 1, RegionCounts::default());
        }
        self.bins[bin].add(sample);

        self.counts.add(sample);
        self.distance_sum += sample.distance_from_bottom;
    }

    /// Produce the immutable summary
    pub fn finish(self, episodes: Vec<FreezingEpisode>) -> Result<SummaryReport> {
        if self.counts.total == 0 {
            return Err(MetricsError::InputFormat(
                "no position samples to aggregate".to_string(),
            ));
        }

        let spf = self.context.seconds_per_frame;
        let seconds = |count: u64| count as f64 * spf;
        let total_time = seconds(self.counts.total);

        let total_freezing_time: f64 = episodes.iter().map(|e| e.duration_sec(spf)).sum();

        let bin_seconds = self.context.bin_seconds;
        let bins = self
            .bins
            .iter()
            .enumerate()
            .map(|(index, counts)| {
                let start_sec = index as f64 * bin_seconds;
                RegionBin {
                    index: index as u32,
                    start_sec,
                    end_sec: (start_sec + bin_seconds).min(total_time),
                    frame_count: counts.total,
                    shares: counts.shares(),
                }
            })
            .collect();

        let report = SummaryReport {
            total_time_top_half: seconds(self.counts.top_half),
            total_time_bottom_half: seconds(self.counts.bottom_half),
            total_time_top_third: seconds(self.counts.top_third),
            total_time_middle_third: seconds(self.counts.middle_third),
            total_time_bottom_third: seconds(self.counts.bottom_third),
            total_freezing_time,
            episode_count: episodes.len() as u32,
            average_distance_from_bottom: self.distance_sum / self.counts.total as f64,
            distance_unit: self.context.distance_unit,
            frame_count: self.counts.total,
            gap_frames: self.context.gap_frames,
            seconds_per_frame: spf,
            total_time,
            roi: self.context.roi,
            shares: self.counts.shares(),
            episodes,
            bins,
        };

        info!(
            frames = report.frame_count,
            total_time = report.total_time,
            freezing_time = report.total_freezing_time,
            episodes = report.episode_count,
            "aggregated summary"
        );
        Ok(report)
    }
}

/// Aggregate a complete set of classified frames
pub fn aggregate(
    context: AggregationContext,
    classified: &[ClassifiedSample],
    episodes: Vec<FreezingEpisode>,
) -> Result<SummaryReport> {
    context.validate()?;
    let mut aggregator = Aggregator::new(context);
    for sample in classified {
        aggregator.add(sample);
    }
    aggregator.finish(episodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn context(seconds_per_frame: f64, bin_seconds: f64) -> AggregationContext {
        AggregationContext {
            roi: Roi {
                x_min: 0.0,
                x_max: 10.0,
                y_min: 0.0,
                y_max: 30.0,
            },
            distance_unit: DistanceUnit::Pixels,
            seconds_per_frame,
            bin_seconds,
            gap_frames: 0,
        }
    }

    fn sample(frame_index: u64, third: ThirdRegion, distance: f64) -> ClassifiedSample {
        let half_region = match third {
            ThirdRegion::Top => HalfRegion::Top,
            _ => HalfRegion::Bottom,
        };
        ClassifiedSample {
            frame_index,
            half_region,
            third_region: third,
            distance_from_bottom: distance,
        }
    }

    #[test]
    fn test_region_times_and_mean_distance() {
        let classified = vec![
            sample(0, ThirdRegion::Top, 25.0),
            sample(1, ThirdRegion::Middle, 15.0),
            sample(2, ThirdRegion::Bottom, 5.0),
            sample(3, ThirdRegion::Bottom, 3.0),
        ];

        let report = aggregate(context(0.5, 60.0), &classified, vec![]).unwrap();

        assert_eq!(report.total_time, 2.0);
        assert_eq!(report.total_time_top_half, 0.5);
        assert_eq!(report.total_time_bottom_half, 1.5);
        assert_eq!(report.total_time_top_third, 0.5);
        assert_eq!(report.total_time_middle_third, 0.5);
        assert_eq!(report.total_time_bottom_third, 1.0);
        assert_eq!(report.average_distance_from_bottom, 12.0);
        assert_eq!(report.shares.bottom_third_pct, 50.0);
        assert_eq!(report.episode_count, 0);
    }

    #[test]
    fn test_freezing_time_sums_episodes() {
        let classified: Vec<ClassifiedSample> =
            (0..100).map(|f| sample(f, ThirdRegion::Top, 0.0)).collect();
        let episodes = vec![
            FreezingEpisode {
                start_frame: 0,
                end_frame: 9,
                frame_count: 10,
            },
            FreezingEpisode {
                start_frame: 50,
                end_frame: 79,
                frame_count: 30,
            },
        ];

        let report = aggregate(context(0.1, 60.0), &classified, episodes).unwrap();
        assert_eq!(report.episode_count, 2);
        assert!((report.total_freezing_time - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_bins_split_by_elapsed_time() {
        // 25 frames at 1 s each with 10 s bins: 10 + 10 + 5 (partial)
        let classified: Vec<ClassifiedSample> = (0..25)
            .map(|f| {
                let third = if f < 10 {
                    ThirdRegion::Top
                } else {
                    ThirdRegion::Bottom
                };
                sample(f, third, 0.0)
            })
            .collect();

        let report = aggregate(context(1.0, 10.0), &classified, vec![]).unwrap();
        let counts: Vec<u64> = report.bins.iter().map(|b| b.frame_count).collect();

        assert_eq!(counts, vec![10, 10, 5]);
        assert_eq!(report.bins[0].shares.top_third_pct, 100.0);
        assert_eq!(report.bins[1].shares.bottom_third_pct, 100.0);
        assert_eq!(report.bins[2].start_sec, 20.0);
        assert_eq!(report.bins[2].end_sec, 25.0);
    }

    #[test]
    fn test_bin_narrower_than_a_frame_is_rejected() {
        let classified: Vec<ClassifiedSample> =
            (0..90).map(|f| sample(f, ThirdRegion::Top, 0.0)).collect();
        let result = aggregate(context(1.0 / 30.0, 1e-5), &classified, vec![]);
        assert!(matches!(result, Err(MetricsError::Configuration(_))));
    }

    #[test]
    fn test_bin_of_exactly_one_frame() {
        let classified: Vec<ClassifiedSample> =
            (0..4).map(|f| sample(f, ThirdRegion::Top, 0.0)).collect();
        let report = aggregate(context(0.5, 0.5), &classified, vec![]).unwrap();
        assert_eq!(report.bins.len(), 4);
        assert!(report.bins.iter().all(|b| b.frame_count == 1));
    }

    #[test]
    fn test_empty_input_is_rejected() {
        let result = aggregate(context(1.0, 60.0), &[], vec![]);
        assert!(matches!(result, Err(MetricsError::InputFormat(_))));
    }
}
