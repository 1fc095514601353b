//! Report encoding and writing
//!
//! Wraps a [`SummaryReport`] with run metadata and serializes it as JSON or as a
//! flat CSV row. CSV output can be appended to an existing file so several runs
//! accumulate in one table.

use crate::error::{MetricsError, Result};
use crate::types::{MetricsReport, RunMetadata, SummaryReport};
use crate::{PRODUCER_NAME, VERSION};
use chrono::Utc;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use tracing::debug;
use uuid::Uuid;

/// Serialization format of the report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportFormat {
    /// Compact JSON
    #[default]
    Json,
    /// Pretty-printed JSON
    JsonPretty,
    /// One CSV row of the headline metrics (with header unless appending)
    Csv,
}

/// Encoder attaching run metadata to summaries
pub struct ReportEncoder {
    run_id: String,
}

impl Default for ReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEncoder {
    /// Create an encoder with a fresh run id
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific run id
    pub fn with_run_id(run_id: String) -> Self {
        Self { run_id }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Wrap a summary in a report
    pub fn encode(
        &self,
        summary: SummaryReport,
        positions_path: Option<&Path>,
        annotation_path: Option<&Path>,
    ) -> MetricsReport {
        MetricsReport {
            metadata: RunMetadata {
                producer: PRODUCER_NAME.to_string(),
                version: VERSION.to_string(),
                run_id: self.run_id.clone(),
                generated_at_utc: Utc::now().to_rfc3339(),
                positions_path: positions_path.map(|p| p.display().to_string()),
                annotation_path: annotation_path.map(|p| p.display().to_string()),
            },
            summary,
        }
    }
}

/// Flat CSV projection of a report
#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    run_id: &'a str,
    positions_path: &'a str,
    total_time: f64,
    total_time_top_half: f64,
    total_time_bottom_half: f64,
    total_time_top_third: f64,
    total_time_middle_third: f64,
    total_time_bottom_third: f64,
    total_freezing_time: f64,
    episode_count: u32,
    average_distance_from_bottom: f64,
    distance_unit: &'static str,
    frame_count: u64,
    gap_frames: u64,
}

impl<'a> From<&'a MetricsReport> for CsvRow<'a> {
    fn from(report: &'a MetricsReport) -> Self {
        let s = &report.summary;
        CsvRow {
            run_id: &report.metadata.run_id,
            positions_path: report.metadata.positions_path.as_deref().unwrap_or(""),
            total_time: s.total_time,
            total_time_top_half: s.total_time_top_half,
            total_time_bottom_half: s.total_time_bottom_half,
            total_time_top_third: s.total_time_top_third,
            total_time_middle_third: s.total_time_middle_third,
            total_time_bottom_third: s.total_time_bottom_third,
            total_freezing_time: s.total_freezing_time,
            episode_count: s.episode_count,
            average_distance_from_bottom: s.average_distance_from_bottom,
            distance_unit: s.distance_unit.as_str(),
            frame_count: s.frame_count,
            gap_frames: s.gap_frames,
        }
    }
}

fn serialize_error(e: impl std::fmt::Display) -> MetricsError {
    MetricsError::Output(format!("cannot serialize report: {}", e))
}

/// Render a report in the given format
pub fn render(report: &MetricsReport, format: ReportFormat, with_header: bool) -> Result<String> {
    match format {
        ReportFormat::Json => serde_json::to_string(report).map_err(serialize_error),
        ReportFormat::JsonPretty => serde_json::to_string_pretty(report).map_err(serialize_error),
        ReportFormat::Csv => {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(with_header)
                .from_writer(Vec::new());
            writer
                .serialize(CsvRow::from(report))
                .map_err(serialize_error)?;
            let bytes = writer.into_inner().map_err(serialize_error)?;
            String::from_utf8(bytes).map_err(serialize_error)
        }
    }
}

/// Write a report to `destination` (`-` means stdout).
///
/// With `append`, CSV rows are added to an existing file and the header is
/// written only when the file is new or empty; JSON output always replaces.
pub fn write_report(
    report: &MetricsReport,
    destination: &Path,
    format: ReportFormat,
    append: bool,
) -> Result<()> {
    let to_stdout = destination.as_os_str() == "-";
    let appending = append && format == ReportFormat::Csv && !to_stdout;

    let existing_rows = appending
        && fs::metadata(destination)
            .map(|m| m.len() > 0)
            .unwrap_or(false);
    let mut rendered = render(report, format, !existing_rows)?;
    if !rendered.ends_with('\n') {
        rendered.push('\n');
    }

    let write_err = |e: io::Error| {
        MetricsError::Output(format!(
            "cannot write report to {}: {}",
            destination.display(),
            e
        ))
    };

    if to_stdout {
        let mut stdout = io::stdout().lock();
        stdout.write_all(rendered.as_bytes()).map_err(write_err)?;
        stdout.flush().map_err(write_err)?;
    } else if appending {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(destination)
            .map_err(write_err)?;
        file.write_all(rendered.as_bytes()).map_err(write_err)?;
    } else {
        fs::write(destination, rendered).map_err(write_err)?;
    }

    debug!(destination = %destination.display(), ?format, appending, "report written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DistanceUnit, RegionShares, Roi};

    fn sample_summary() -> SummaryReport {
        SummaryReport {
            total_time_top_half: 1.5,
            total_time_bottom_half: 1.5,
            total_time_top_third: 1.0,
            total_time_middle_third: 1.0,
            total_time_bottom_third: 1.0,
            total_freezing_time: 0.0,
            episode_count: 0,
            average_distance_from_bottom: 45.5,
            distance_unit: DistanceUnit::Pixels,
            frame_count: 90,
            gap_frames: 0,
            seconds_per_frame: 1.0 / 30.0,
            total_time: 3.0,
            roi: Roi {
                x_min: 0.0,
                x_max: 100.0,
                y_min: 0.0,
                y_max: 90.0,
            },
            shares: RegionShares::default(),
            episodes: vec![],
            bins: vec![],
        }
    }

    fn sample_report() -> MetricsReport {
        ReportEncoder::with_run_id("run-1".to_string()).encode(
            sample_summary(),
            Some(Path::new("fish1.csv")),
            None,
        )
    }

    #[test]
    fn test_encode_attaches_metadata() {
        let report = sample_report();
        assert_eq!(report.metadata.producer, PRODUCER_NAME);
        assert_eq!(report.metadata.run_id, "run-1");
        assert_eq!(report.metadata.positions_path.as_deref(), Some("fish1.csv"));
        assert!(report.metadata.annotation_path.is_none());
    }

    #[test]
    fn test_fresh_encoders_get_distinct_run_ids() {
        assert_ne!(ReportEncoder::new().run_id(), ReportEncoder::new().run_id());
    }

    #[test]
    fn test_render_json() {
        let json = render(&sample_report(), ReportFormat::Json, true).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["summary"]["total_time"], 3.0);
        assert_eq!(value["summary"]["distance_unit"], "pixels");
        assert_eq!(value["metadata"]["run_id"], "run-1");
        assert!(value["metadata"].get("annotation_path").is_none());
    }

    #[test]
    fn test_render_csv_header_toggle() {
        let with_header = render(&sample_report(), ReportFormat::Csv, true).unwrap();
        let without_header = render(&sample_report(), ReportFormat::Csv, false).unwrap();

        assert!(with_header.starts_with("run_id,positions_path,total_time"));
        assert_eq!(with_header.lines().count(), 2);
        assert_eq!(without_header.lines().count(), 1);
        assert!(without_header.starts_with("run-1,fish1.csv,3.0"));
    }

    #[test]
    fn test_csv_append_writes_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.csv");

        write_report(&sample_report(), &path, ReportFormat::Csv, true).unwrap();
        write_report(&sample_report(), &path, ReportFormat::Csv, true).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 3);
        assert_eq!(content.matches("run_id").count(), 1);
    }

    #[test]
    fn test_unwritable_destination_is_output_error() {
        let result = write_report(
            &sample_report(),
            Path::new("/nonexistent-dir/report.json"),
            ReportFormat::Json,
            false,
        );
        assert!(matches!(result, Err(MetricsError::Output(_))));
    }
}
