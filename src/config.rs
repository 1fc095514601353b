//! Run configuration
//!
//! A run is described by one immutable [`RunConfig`]: how frame time is derived,
//! optional physical calibration, freezing detection parameters and the width of
//! the region breakdown bins. Configuration can be assembled from named CLI
//! options, from a JSON file, or both (options override the file).

use crate::error::{MetricsError, Result};
use serde::{Deserialize, Serialize};

/// Default displacement below which the animal counts as still (pixels per frame)
pub const DEFAULT_FREEZING_THRESHOLD_PX: f64 = 2.0;

/// Default minimum length of a freezing episode (seconds)
pub const DEFAULT_FREEZING_MIN_DURATION_SEC: f64 = 2.0;

/// Default width of a region breakdown bin (one minute)
pub const DEFAULT_BIN_SECONDS: f64 = 60.0;

/// How the duration of a single frame is derived
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Timing {
    /// Total trial length; frame time = seconds / selected frame count
    TrialLength { seconds: f64 },
    /// Fixed video frame rate; frame time = 1 / fps
    Fps { fps: f64 },
}

impl Timing {
    /// Build the timing from the two mutually exclusive options.
    ///
    /// Exactly one of `time_sec` and `fps` must be supplied.
    pub fn from_options(time_sec: Option<f64>, fps: Option<f64>) -> Result<Self> {
        let timing = match (time_sec, fps) {
            (Some(seconds), None) => Timing::TrialLength { seconds },
            (None, Some(fps)) => Timing::Fps { fps },
            (Some(_), Some(_)) => {
                return Err(MetricsError::Configuration(
                    "both 'time' and 'fps' were supplied; give exactly one".to_string(),
                ))
            }
            (None, None) => {
                return Err(MetricsError::Configuration(
                    "neither 'time' nor 'fps' was supplied; give exactly one".to_string(),
                ))
            }
        };
        timing.validate()?;
        Ok(timing)
    }

    /// Check that the supplied value is usable
    pub fn validate(&self) -> Result<()> {
        let (name, value) = match self {
            Timing::TrialLength { seconds } => ("time", *seconds),
            Timing::Fps { fps } => ("fps", *fps),
        };
        if !value.is_finite() || value <= 0.0 {
            return Err(MetricsError::Configuration(format!(
                "'{}' must be a positive number, got {}",
                name, value
            )));
        }
        Ok(())
    }

    /// Seconds represented by one selected frame
    pub fn seconds_per_frame(&self, frame_count: usize) -> Result<f64> {
        self.validate()?;
        match self {
            Timing::Fps { fps } => Ok(1.0 / fps),
            Timing::TrialLength { seconds } => {
                if frame_count == 0 {
                    return Err(MetricsError::InputFormat(
                        "cannot derive frame time from trial length: no frames".to_string(),
                    ));
                }
                Ok(seconds / frame_count as f64)
            }
        }
    }
}

/// Real-world tank dimensions used to convert pixels into physical units
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationMaxima {
    /// Physical width spanned by the ROI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_x: Option<f64>,
    /// Physical height spanned by the ROI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_y: Option<f64>,
}

impl CalibrationMaxima {
    pub fn is_empty(&self) -> bool {
        self.max_x.is_none() && self.max_y.is_none()
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [("x", self.max_x), ("y", self.max_y)] {
            if let Some(v) = value {
                if !v.is_finite() || v <= 0.0 {
                    return Err(MetricsError::Configuration(format!(
                        "calibration maximum '{}' must be a positive number, got {}",
                        name, v
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Freezing detection parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FreezingConfig {
    /// Inter-frame displacement (raw pixels) below which a step counts as still
    pub threshold_px: f64,
    /// Minimum episode duration (seconds) for a still run to count
    pub min_duration_sec: f64,
}

impl Default for FreezingConfig {
    fn default() -> Self {
        Self {
            threshold_px: DEFAULT_FREEZING_THRESHOLD_PX,
            min_duration_sec: DEFAULT_FREEZING_MIN_DURATION_SEC,
        }
    }
}

impl FreezingConfig {
    fn validate(&self) -> Result<()> {
        if !self.threshold_px.is_finite() || self.threshold_px <= 0.0 {
            return Err(MetricsError::Configuration(format!(
                "freezing threshold must be a positive number of pixels, got {}",
                self.threshold_px
            )));
        }
        if !self.min_duration_sec.is_finite() || self.min_duration_sec < 0.0 {
            return Err(MetricsError::Configuration(format!(
                "freezing minimum duration must be a non-negative number of seconds, got {}",
                self.min_duration_sec
            )));
        }
        Ok(())
    }
}

fn default_bin_seconds() -> f64 {
    DEFAULT_BIN_SECONDS
}

/// Immutable configuration for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub timing: Timing,
    #[serde(default)]
    pub calibration: CalibrationMaxima,
    #[serde(default)]
    pub freezing: FreezingConfig,
    #[serde(default = "default_bin_seconds")]
    pub bin_seconds: f64,
}

impl RunConfig {
    /// Create a configuration with default freezing and binning parameters
    pub fn new(timing: Timing) -> Self {
        Self {
            timing,
            calibration: CalibrationMaxima::default(),
            freezing: FreezingConfig::default(),
            bin_seconds: DEFAULT_BIN_SECONDS,
        }
    }

    /// Attach calibration maxima
    pub fn with_calibration(mut self, max_x: Option<f64>, max_y: Option<f64>) -> Self {
        self.calibration = CalibrationMaxima { max_x, max_y };
        self
    }

    /// Replace freezing parameters
    pub fn with_freezing(mut self, freezing: FreezingConfig) -> Self {
        self.freezing = freezing;
        self
    }

    /// Parse a configuration from JSON and validate it
    pub fn from_json(json: &str) -> Result<Self> {
        let config: RunConfig = serde_json::from_str(json)
            .map_err(|e| MetricsError::Configuration(format!("invalid config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check every invariant of the configuration
    pub fn validate(&self) -> Result<()> {
        self.timing.validate()?;
        self.calibration.validate()?;
        self.freezing.validate()?;
        if !self.bin_seconds.is_finite() || self.bin_seconds <= 0.0 {
            return Err(MetricsError::Configuration(format!(
                "bin width must be a positive number of seconds, got {}",
                self.bin_seconds
            )));
        }
        Ok(())
    }
}

/// Partially specified configuration, as read from a file or named options.
///
/// Two layers are merged with [`ConfigLayer::merge`] and turned into a
/// [`RunConfig`] with [`ConfigLayer::resolve`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigLayer {
    pub time_sec: Option<f64>,
    pub fps: Option<f64>,
    pub max_x: Option<f64>,
    pub max_y: Option<f64>,
    pub freezing_threshold_px: Option<f64>,
    pub freezing_min_duration_sec: Option<f64>,
    pub bin_seconds: Option<f64>,
}

impl ConfigLayer {
    /// Parse a layer from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| MetricsError::Configuration(format!("invalid config JSON: {}", e)))
    }

    /// Overlay `overrides` on top of `self`.
    ///
    /// Timing is replaced as a unit: if the override names either `time_sec` or
    /// `fps`, the base layer's timing is dropped entirely.
    pub fn merge(self, overrides: ConfigLayer) -> ConfigLayer {
        let (time_sec, fps) = if overrides.time_sec.is_some() || overrides.fps.is_some() {
            (overrides.time_sec, overrides.fps)
        } else {
            (self.time_sec, self.fps)
        };

        ConfigLayer {
            time_sec,
            fps,
            max_x: overrides.max_x.or(self.max_x),
            max_y: overrides.max_y.or(self.max_y),
            freezing_threshold_px: overrides
                .freezing_threshold_px
                .or(self.freezing_threshold_px),
            freezing_min_duration_sec: overrides
                .freezing_min_duration_sec
                .or(self.freezing_min_duration_sec),
            bin_seconds: overrides.bin_seconds.or(self.bin_seconds),
        }
    }

    /// Produce a validated configuration, filling defaults
    pub fn resolve(self) -> Result<RunConfig> {
        let timing = Timing::from_options(self.time_sec, self.fps)?;
        let defaults = FreezingConfig::default();

        let config = RunConfig {
            timing,
            calibration: CalibrationMaxima {
                max_x: self.max_x,
                max_y: self.max_y,
            },
            freezing: FreezingConfig {
                threshold_px: self.freezing_threshold_px.unwrap_or(defaults.threshold_px),
                min_duration_sec: self
                    .freezing_min_duration_sec
                    .unwrap_or(defaults.min_duration_sec),
            },
            bin_seconds: self.bin_seconds.unwrap_or(DEFAULT_BIN_SECONDS),
        };
        config.validate()?;
        Ok(config)
    }
}
