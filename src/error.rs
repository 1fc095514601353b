//! Error types for tank metrics

use thiserror::Error;

/// Errors that can occur during a metrics run.
///
/// Every variant is fatal: the run stops at the first error.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// Bad, missing or conflicting run parameters, or a missing ROI.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Malformed position CSV or annotation content.
    #[error("Input format error: {0}")]
    InputFormat(String),

    /// The report could not be serialized or written.
    #[error("Output error: {0}")]
    Output(String),
}

impl MetricsError {
    /// Short machine-readable code for the error category
    pub fn code(&self) -> &'static str {
        match self {
            MetricsError::Configuration(_) => "CONFIGURATION_ERROR",
            MetricsError::InputFormat(_) => "INPUT_FORMAT_ERROR",
            MetricsError::Output(_) => "OUTPUT_ERROR",
        }
    }
}

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, MetricsError>;
