//! Core types for the tank metrics pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: raw position samples, the tank ROI and calibration, per-frame
//! classifications, freezing episodes and the final summary report.

use serde::{Deserialize, Serialize};

/// One tracked centroid position as reported by the upstream tracker
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    /// Track identifier; higher ids were created later
    pub track_id: i64,
    /// Video frame index (strictly increasing within a track)
    pub frame_index: u64,
    /// Horizontal position (pixels)
    pub x: f64,
    /// Vertical position (pixels, growing downward)
    pub y: f64,
}

impl PositionSample {
    pub fn new(track_id: i64, frame_index: u64, x: f64, y: f64) -> Self {
        Self {
            track_id,
            frame_index,
            x,
            y,
        }
    }

    /// Euclidean distance to another sample in raw pixels
    pub fn displacement_to(&self, other: &PositionSample) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// A polygon vertex in raw pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Parsed content of a tracker annotation file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// Plain `key:value` header parameters, in file order
    pub parameters: Vec<(String, String)>,
    /// ROI polygons drawn in the tracker; the first one is the tank
    pub roi_polygons: Vec<Vec<Point>>,
}

impl Annotation {
    /// Look up a header parameter by key
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Tank bounding box in raw pixel coordinates.
///
/// Image coordinates: `y_min` is the top edge of the tank and `y_max` the bottom.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Roi {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl Roi {
    /// Horizontal span in pixels
    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    /// Vertical span in pixels
    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }
}

/// Unit in which distances are reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceUnit {
    /// No calibration supplied; raw pixel units
    Pixels,
    /// Physical units derived from user-supplied tank dimensions
    Calibrated,
}

impl DistanceUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceUnit::Pixels => "pixels",
            DistanceUnit::Calibrated => "calibrated",
        }
    }
}

/// Pixel-to-physical conversion ratio per axis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationFactor {
    /// Physical units per pixel along x
    pub units_per_pixel_x: f64,
    /// Physical units per pixel along y
    pub units_per_pixel_y: f64,
    /// Unit the factors convert into
    pub unit: DistanceUnit,
}

impl CalibrationFactor {
    /// Identity calibration: distances stay in pixels
    pub fn identity() -> Self {
        Self {
            units_per_pixel_x: 1.0,
            units_per_pixel_y: 1.0,
            unit: DistanceUnit::Pixels,
        }
    }
}

impl Default for CalibrationFactor {
    fn default() -> Self {
        Self::identity()
    }
}

/// Vertical half of the tank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HalfRegion {
    Top,
    Bottom,
}

/// Vertical third of the tank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThirdRegion {
    Top,
    Middle,
    Bottom,
}

/// Region classification and distance for a single selected frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedSample {
    pub frame_index: u64,
    pub half_region: HalfRegion,
    pub third_region: ThirdRegion,
    /// Distance from the tank bottom in the calibration unit
    pub distance_from_bottom: f64,
}

/// A maximal run of consecutive still frames that lasted long enough to count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreezingEpisode {
    pub start_frame: u64,
    pub end_frame: u64,
    /// Number of still frames, `end_frame - start_frame + 1`
    pub frame_count: u64,
}

impl FreezingEpisode {
    /// Episode duration in seconds, one frame per still step
    pub fn duration_sec(&self, seconds_per_frame: f64) -> f64 {
        self.frame_count as f64 * seconds_per_frame
    }
}

/// Share of frames per region (percentages, 0-100)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionShares {
    pub top_half_pct: f64,
    pub bottom_half_pct: f64,
    pub top_third_pct: f64,
    pub middle_third_pct: f64,
    pub bottom_third_pct: f64,
}

/// Region shares over one time bin of the trial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionBin {
    /// Zero-based bin index
    pub index: u32,
    /// Bin start (seconds from trial start)
    pub start_sec: f64,
    /// Bin end (seconds from trial start); the last bin may be partial
    pub end_sec: f64,
    /// Frames that fell into the bin
    pub frame_count: u64,
    #[serde(flatten)]
    pub shares: RegionShares,
}

/// Provenance and run metadata attached to every report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub producer: String,
    pub version: String,
    pub run_id: String,
    pub generated_at_utc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub positions_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation_path: Option<String>,
}

/// Final per-run summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryReport {
    /// Seconds in the top half
    pub total_time_top_half: f64,
    /// Seconds in the bottom half
    pub total_time_bottom_half: f64,
    /// Seconds in the top third
    pub total_time_top_third: f64,
    /// Seconds in the middle third
    pub total_time_middle_third: f64,
    /// Seconds in the bottom third
    pub total_time_bottom_third: f64,
    /// Sum of all freezing episode durations (seconds)
    pub total_freezing_time: f64,
    /// Number of freezing episodes emitted
    pub episode_count: u32,
    /// Mean distance from the bottom, in `distance_unit`
    pub average_distance_from_bottom: f64,
    pub distance_unit: DistanceUnit,
    /// Selected frames that contributed to the totals
    pub frame_count: u64,
    /// Frame indices missing from every track
    pub gap_frames: u64,
    pub seconds_per_frame: f64,
    /// Total analysed time (seconds)
    pub total_time: f64,
    pub roi: Roi,
    pub shares: RegionShares,
    pub episodes: Vec<FreezingEpisode>,
    pub bins: Vec<RegionBin>,
}

/// Complete report payload: run metadata plus the summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub metadata: RunMetadata,
    pub summary: SummaryReport,
}
