//! Region classification
//!
//! Maps a selected position to the vertical half and third of the tank it
//! occupies and computes its calibrated distance from the tank bottom.
//!
//! Image coordinates are used throughout: `y_min` is the top edge and `y_max`
//! the bottom edge. Every band includes its low edge, so the exact midpoint
//! belongs to the bottom half and each third boundary belongs to the band
//! below it.

use crate::types::{CalibrationFactor, ClassifiedSample, HalfRegion, PositionSample, Roi, ThirdRegion};

/// Classifier bound to one run's ROI and calibration
#[derive(Debug, Clone, Copy)]
pub struct RegionClassifier {
    roi: Roi,
    calibration: CalibrationFactor,
    midpoint: f64,
    upper_third: f64,
    lower_third: f64,
}

impl RegionClassifier {
    pub fn new(roi: Roi, calibration: CalibrationFactor) -> Self {
        let span = roi.height();
        Self {
            roi,
            calibration,
            midpoint: roi.y_min + span / 2.0,
            upper_third: roi.y_min + span / 3.0,
            lower_third: roi.y_min + 2.0 * span / 3.0,
        }
    }

    /// Whether `y` lies outside the ROI and will be clamped
    pub fn is_outside(&self, y: f64) -> bool {
        y < self.roi.y_min || y > self.roi.y_max
    }

    /// Vertical half containing `y` (clamped to the ROI)
    pub fn half_region(&self, y: f64) -> HalfRegion {
        if self.clamp_y(y) < self.midpoint {
            HalfRegion::Top
        } else {
            HalfRegion::Bottom
        }
    }

    /// Vertical third containing `y` (clamped to the ROI)
    pub fn third_region(&self, y: f64) -> ThirdRegion {
        let y = self.clamp_y(y);
        if y < self.upper_third {
            ThirdRegion::Top
        } else if y < self.lower_third {
            ThirdRegion::Middle
        } else {
            ThirdRegion::Bottom
        }
    }

    /// Distance from the tank bottom in the calibration unit
    pub fn distance_from_bottom(&self, y: f64) -> f64 {
        (self.roi.y_max - self.clamp_y(y)) * self.calibration.units_per_pixel_y
    }

    /// Classify one selected sample
    pub fn classify(&self, sample: &PositionSample) -> ClassifiedSample {
        ClassifiedSample {
            frame_index: sample.frame_index,
            half_region: self.half_region(sample.y),
            third_region: self.third_region(sample.y),
            distance_from_bottom: self.distance_from_bottom(sample.y),
        }
    }

    fn clamp_y(&self, y: f64) -> f64 {
        y.clamp(self.roi.y_min, self.roi.y_max)
    }
}
