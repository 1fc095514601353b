//! Pipeline orchestration
//!
//! This module provides the public API for tank metrics.
//! It runs the full pipeline from position samples and annotation content to
//! the summary report.

use crate::aggregate::{AggregationContext, Aggregator};
use crate::calibration::RoiCalibrator;
use crate::config::RunConfig;
use crate::error::{MetricsError, Result};
use crate::freezing::detect_freezing;
use crate::input::{read_annotation, read_positions, CsvLayout};
use crate::region::RegionClassifier;
use crate::report::ReportEncoder;
use crate::tracks::{HighestTrackId, SelectionStrategy, TrackSelector};
use crate::types::{Annotation, MetricsReport, PositionSample, SummaryReport};
use std::path::Path;
use tracing::{debug, info, warn};

/// Compute the summary for one run with the default track selection policy.
///
/// # Arguments
/// * `samples` - All tracked positions, possibly with overlapping tracks
/// * `annotation` - Parsed annotation content holding the tank ROI
/// * `config` - Run configuration
///
/// # Example
/// ```ignore
/// let config = RunConfig::new(Timing::Fps { fps: 30.0 });
/// let summary = analyze(&samples, &annotation, &config)?;
/// ```
pub fn analyze(
    samples: &[PositionSample],
    annotation: &Annotation,
    config: &RunConfig,
) -> Result<SummaryReport> {
    TankProcessor::new(config.clone()).analyze(samples, annotation)
}

/// Read a positions CSV and an annotation file and compute the full report.
pub fn analyze_files(
    positions_path: &Path,
    annotation_path: &Path,
    layout: CsvLayout,
    config: &RunConfig,
) -> Result<MetricsReport> {
    TankProcessor::new(config.clone()).analyze_files(positions_path, annotation_path, layout)
}

/// Processor bound to one configuration and selection strategy.
///
/// Pipeline stages:
/// 1. RoiCalibrator - ROI and calibration factor from the annotation
/// 2. TrackSelector - one sample per frame
/// 3. RegionClassifier - half/third region and distance per frame
/// 4. FreezingDetector - immobility episodes from raw movement
/// 5. Aggregator - summary report
pub struct TankProcessor {
    config: RunConfig,
    strategy: Box<dyn SelectionStrategy>,
    encoder: ReportEncoder,
}

impl TankProcessor {
    /// Create a processor using the highest-track-id selection policy
    pub fn new(config: RunConfig) -> Self {
        Self::with_strategy(config, Box::new(HighestTrackId))
    }

    /// Create a processor with a custom track selection policy
    pub fn with_strategy(config: RunConfig, strategy: Box<dyn SelectionStrategy>) -> Self {
        Self {
            config,
            strategy,
            encoder: ReportEncoder::new(),
        }
    }

    /// Replace the report encoder (e.g. to pin the run id)
    pub fn with_encoder(mut self, encoder: ReportEncoder) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run every stage over already-parsed inputs
    pub fn analyze(
        &self,
        samples: &[PositionSample],
        annotation: &Annotation,
    ) -> Result<SummaryReport> {
        self.config.validate()?;

        // Stage 1: ROI and calibration
        let (roi, calibration) = RoiCalibrator::extract(annotation, &self.config.calibration)?;

        // Stage 2: one sample per frame
        let selection = TrackSelector::new(self.strategy.as_ref()).select(samples);
        if selection.samples.is_empty() {
            return Err(MetricsError::InputFormat(
                "no position samples with a valid track".to_string(),
            ));
        }
        if selection.track_count > 1 {
            debug!(
                tracks = selection.track_count,
                "multiple tracks present, keeping one per frame"
            );
        }

        let seconds_per_frame = self
            .config
            .timing
            .seconds_per_frame(selection.samples.len())?;

        // Stage 3: classification and aggregation
        let classifier = RegionClassifier::new(roi, calibration);
        let context = AggregationContext {
            roi,
            distance_unit: calibration.unit,
            seconds_per_frame,
            bin_seconds: self.config.bin_seconds,
            gap_frames: selection.gap_frames,
        };
        context.validate()?;
        let mut aggregator = Aggregator::new(context);

        let mut clamped = 0usize;
        for sample in &selection.samples {
            if classifier.is_outside(sample.y) {
                clamped += 1;
            }
            aggregator.add(&classifier.classify(sample));
        }
        if clamped > 0 {
            warn!(clamped, "positions outside the ROI were clamped to its edge");
        }
        if selection.gap_frames > 0 {
            warn!(
                gap_frames = selection.gap_frames,
                "frames without any track were excluded from totals"
            );
        }

        // Stage 4: freezing episodes from raw movement
        let episodes = detect_freezing(&selection.samples, self.config.freezing, seconds_per_frame);

        // Stage 5: summary
        aggregator.finish(episodes)
    }

    /// Read both input files, run the pipeline and wrap the result with metadata
    pub fn analyze_files(
        &self,
        positions_path: &Path,
        annotation_path: &Path,
        layout: CsvLayout,
    ) -> Result<MetricsReport> {
        let annotation = read_annotation(annotation_path)?;
        if let Some(version) = annotation.parameter("version") {
            debug!(version, "annotation written by tracker version");
        }
        let samples = read_positions(positions_path, layout)?;
        info!(
            positions = %positions_path.display(),
            samples = samples.len(),
            "loaded positions"
        );

        let summary = self.analyze(&samples, &annotation)?;
        Ok(self
            .encoder
            .encode(summary, Some(positions_path), Some(annotation_path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FreezingConfig, Timing};
    use crate::types::{DistanceUnit, Point};
    use std::io::Write;

    fn tank_annotation() -> Annotation {
        Annotation {
            parameters: vec![],
            roi_polygons: vec![vec![
                Point { x: 0.0, y: 0.0 },
                Point { x: 100.0, y: 0.0 },
                Point { x: 100.0, y: 90.0 },
                Point { x: 0.0, y: 90.0 },
            ]],
        }
    }

    fn linear_descent() -> Vec<PositionSample> {
        (0..90)
            .map(|f| PositionSample::new(0, f, 50.0, f as f64))
            .collect()
    }

    #[test]
    fn test_end_to_end_linear_descent() {
        // One pixel per frame must read as movement
        let config = RunConfig::new(Timing::Fps { fps: 30.0 }).with_freezing(FreezingConfig {
            threshold_px: 0.5,
            min_duration_sec: 2.0,
        });
        let summary = analyze(&linear_descent(), &tank_annotation(), &config).unwrap();

        assert!((summary.total_time - 3.0).abs() < 1e-9);
        assert!((summary.total_time_top_half - 1.5).abs() < 1e-9);
        assert!((summary.total_time_bottom_half - 1.5).abs() < 1e-9);
        assert!((summary.total_time_top_third - 1.0).abs() < 1e-9);
        assert!((summary.total_time_middle_third - 1.0).abs() < 1e-9);
        assert!((summary.total_time_bottom_third - 1.0).abs() < 1e-9);
        // Mean of (90 - y) for y in 0..=89
        assert!((summary.average_distance_from_bottom - 45.5).abs() < 1e-9);
        assert_eq!(summary.frame_count, 90);
        assert_eq!(summary.episode_count, 0);
        assert_eq!(summary.distance_unit, DistanceUnit::Pixels);
    }

    #[test]
    fn test_end_to_end_boundary_frames() {
        let config = RunConfig::new(Timing::Fps { fps: 30.0 });
        let annotation = tank_annotation();
        let (roi, calibration) =
            RoiCalibrator::extract(&annotation, &config.calibration).unwrap();
        let classifier = RegionClassifier::new(roi, calibration);

        let samples = linear_descent();
        let first_bottom_half = samples
            .iter()
            .find(|s| classifier.classify(s).half_region == crate::types::HalfRegion::Bottom)
            .map(|s| s.frame_index);
        let first_middle = samples
            .iter()
            .find(|s| classifier.classify(s).third_region == crate::types::ThirdRegion::Middle)
            .map(|s| s.frame_index);
        let first_bottom_third = samples
            .iter()
            .find(|s| classifier.classify(s).third_region == crate::types::ThirdRegion::Bottom)
            .map(|s| s.frame_index);

        assert_eq!(first_bottom_half, Some(45));
        assert_eq!(first_middle, Some(30));
        assert_eq!(first_bottom_third, Some(60));
    }

    #[test]
    fn test_trial_length_timing_divides_by_selected_frames() {
        let config = RunConfig::new(Timing::TrialLength { seconds: 9.0 });
        let summary = analyze(&linear_descent(), &tank_annotation(), &config).unwrap();

        assert!((summary.seconds_per_frame - 0.1).abs() < 1e-12);
        assert!((summary.total_time - 9.0).abs() < 1e-9);
    }

    #[test]
    fn test_overlapping_tracks_and_freezing() {
        let mut samples: Vec<PositionSample> = (0..60)
            .map(|f| PositionSample::new(1, f, 20.0, 80.0))
            .collect();
        // An older, noisier track covering the same frames must be ignored
        samples.extend((0..60).map(|f| PositionSample::new(0, f, f as f64, 10.0)));

        let config = RunConfig::new(Timing::Fps { fps: 10.0 }).with_freezing(FreezingConfig {
            threshold_px: 1.0,
            min_duration_sec: 3.0,
        });
        let summary = analyze(&samples, &tank_annotation(), &config).unwrap();

        assert_eq!(summary.frame_count, 60);
        // 60 stationary samples are 59 still frames
        assert_eq!(summary.episode_count, 1);
        assert!((summary.total_freezing_time - 5.9).abs() < 1e-9);
        assert!((summary.total_time_bottom_third - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_roi_fails_before_processing() {
        let config = RunConfig::new(Timing::Fps { fps: 30.0 });
        let result = analyze(&linear_descent(), &Annotation::default(), &config);
        assert!(matches!(result, Err(MetricsError::Configuration(_))));
    }

    #[test]
    fn test_no_samples_is_input_format_error() {
        let config = RunConfig::new(Timing::Fps { fps: 30.0 });
        let result = analyze(&[], &tank_annotation(), &config);
        assert!(matches!(result, Err(MetricsError::InputFormat(_))));
    }

    #[test]
    fn test_extreme_frame_indices_are_analyzed() {
        let samples = crate::input::parse_positions(
            "track_id,frame_index,x,y\n0,0,1,1\n0,18446744073709551615,2,2\n",
            CsvLayout::Long,
            "positions.csv",
        )
        .unwrap();
        let config = RunConfig::new(Timing::Fps { fps: 30.0 });
        let summary = analyze(&samples, &tank_annotation(), &config).unwrap();

        assert_eq!(summary.frame_count, 2);
        assert_eq!(summary.gap_frames, u64::MAX - 1);
        assert_eq!(summary.episode_count, 0);
    }

    #[test]
    fn test_tiny_bin_width_is_configuration_error() {
        let mut config = RunConfig::new(Timing::Fps { fps: 30.0 });
        config.bin_seconds = 1e-5;
        let result = analyze(&linear_descent(), &tank_annotation(), &config);
        assert!(matches!(result, Err(MetricsError::Configuration(_))));
    }

    #[test]
    fn test_calibrated_distance_flows_through() {
        let config = RunConfig::new(Timing::Fps { fps: 30.0 }).with_calibration(Some(10.0), Some(9.0));
        let summary = analyze(&linear_descent(), &tank_annotation(), &config).unwrap();

        assert_eq!(summary.distance_unit, DistanceUnit::Calibrated);
        assert!((summary.average_distance_from_bottom - 4.55).abs() < 1e-9);
    }

    #[test]
    fn test_analyze_files() {
        let dir = tempfile::tempdir().unwrap();
        let positions = dir.path().join("fish.csv");
        let annotation = dir.path().join("fish.ann");

        let mut csv = std::fs::File::create(&positions).unwrap();
        for f in 0..90 {
            writeln!(csv, "0,50.0,{}.0,1,1,0", f).unwrap();
        }
        std::fs::write(&annotation, "roipolygons:[[[0,0],[100,0],[100,90],[0,90]]]\n").unwrap();

        let processor = TankProcessor::new(RunConfig::new(Timing::Fps { fps: 30.0 }))
            .with_encoder(ReportEncoder::with_run_id("fixed".to_string()));
        let report = processor
            .analyze_files(&positions, &annotation, CsvLayout::Auto)
            .unwrap();

        assert_eq!(report.metadata.run_id, "fixed");
        assert_eq!(report.summary.frame_count, 90);
        assert!((report.summary.total_time_top_half - 1.5).abs() < 1e-9);
    }
}
