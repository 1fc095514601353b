//! ROI extraction and pixel calibration
//!
//! This module turns parsed annotation content into the tank bounding box and,
//! when real-world tank dimensions are supplied, a per-axis calibration factor.

use crate::config::CalibrationMaxima;
use crate::error::{MetricsError, Result};
use crate::types::{Annotation, CalibrationFactor, DistanceUnit, Roi};
use tracing::debug;

/// Minimum number of vertices for a usable ROI polygon
const MIN_ROI_VERTICES: usize = 3;

/// Calibrator for deriving the ROI and calibration factor of a run
pub struct RoiCalibrator;

impl RoiCalibrator {
    /// Extract the tank ROI as the bounding box of the first ROI polygon
    pub fn extract_roi(annotation: &Annotation) -> Result<Roi> {
        let polygon = annotation.roi_polygons.first().ok_or_else(|| {
            MetricsError::Configuration("annotation defines no ROI polygon".to_string())
        })?;

        if polygon.len() < MIN_ROI_VERTICES {
            return Err(MetricsError::Configuration(format!(
                "ROI polygon has {} vertices, need at least {}",
                polygon.len(),
                MIN_ROI_VERTICES
            )));
        }

        let mut roi = Roi {
            x_min: f64::INFINITY,
            x_max: f64::NEG_INFINITY,
            y_min: f64::INFINITY,
            y_max: f64::NEG_INFINITY,
        };
        for point in polygon {
            roi.x_min = roi.x_min.min(point.x);
            roi.x_max = roi.x_max.max(point.x);
            roi.y_min = roi.y_min.min(point.y);
            roi.y_max = roi.y_max.max(point.y);
        }

        if !(roi.width() > 0.0) || !(roi.height() > 0.0) {
            return Err(MetricsError::Configuration(format!(
                "ROI is degenerate: x [{}, {}], y [{}, {}]",
                roi.x_min, roi.x_max, roi.y_min, roi.y_max
            )));
        }

        debug!(?roi, polygons = annotation.roi_polygons.len(), "extracted ROI");
        Ok(roi)
    }

    /// Compute the calibration factor for an ROI.
    ///
    /// Each supplied maximum is divided by the ROI pixel span on that axis; an
    /// axis without a maximum keeps a factor of 1.
    pub fn calibrate(roi: &Roi, maxima: &CalibrationMaxima) -> Result<CalibrationFactor> {
        if maxima.is_empty() {
            return Ok(CalibrationFactor::identity());
        }

        let units_per_pixel_x = axis_factor("x", maxima.max_x, roi.width())?;
        let units_per_pixel_y = axis_factor("y", maxima.max_y, roi.height())?;

        let factor = CalibrationFactor {
            units_per_pixel_x,
            units_per_pixel_y,
            unit: DistanceUnit::Calibrated,
        };
        debug!(?factor, "derived calibration factor");
        Ok(factor)
    }

    /// Extract the ROI and its calibration in one step
    pub fn extract(
        annotation: &Annotation,
        maxima: &CalibrationMaxima,
    ) -> Result<(Roi, CalibrationFactor)> {
        let roi = Self::extract_roi(annotation)?;
        let factor = Self::calibrate(&roi, maxima)?;
        Ok((roi, factor))
    }
}

fn axis_factor(axis: &str, supplied_max: Option<f64>, pixel_span: f64) -> Result<f64> {
    match supplied_max {
        None => Ok(1.0),
        Some(max) if max.is_finite() && max > 0.0 && pixel_span > 0.0 => Ok(max / pixel_span),
        Some(max) => Err(MetricsError::Configuration(format!(
            "cannot calibrate {} axis: maximum {} over pixel span {}",
            axis, max, pixel_span
        ))),
    }
}
