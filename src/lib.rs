//! Tank Metrics - behavioral metrics from tracked animal positions in a tank
//!
//! Tank Metrics turns a tracker's per-frame centroid positions and the tank ROI
//! from its annotation file into a summary of where the animal spent its time,
//! through a deterministic pipeline: ROI calibration → track selection → region
//! classification → freezing detection → aggregation.
//!
//! ## Modules
//!
//! - **Core pipeline**: [`calibration`], [`tracks`], [`region`], [`freezing`], [`aggregate`]
//! - **I/O adapters**: [`input`] (positions CSV, annotation file), [`report`] (JSON/CSV)

pub mod aggregate;
pub mod calibration;
pub mod config;
pub mod error;
pub mod freezing;
pub mod input;
pub mod pipeline;
pub mod region;
pub mod report;
pub mod tracks;
pub mod types;

pub use config::{ConfigLayer, FreezingConfig, RunConfig, Timing};
pub use error::MetricsError;
pub use pipeline::{analyze, analyze_files, TankProcessor};
pub use tracks::{HighestTrackId, SelectionStrategy};

/// Crate version embedded in every report
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for report metadata
pub const PRODUCER_NAME: &str = "tank-metrics";
