//! Input adapters
//!
//! Thin readers turning the tracker's files into the structured records the
//! pipeline consumes:
//! - Position CSV → `Vec<PositionSample>`
//! - Annotation file → [`Annotation`] (header parameters plus ROI polygons)

use crate::error::{MetricsError, Result};
use crate::types::{Annotation, Point, PositionSample};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Columns per track in the tracker's wide CSV layout (id, x, y, a, b, theta)
pub const CTRAX_COLUMNS_PER_TRACK: usize = 6;

/// Annotation key opening the ROI block
const ROI_KEY: &str = "roipolygons";

/// Annotation key closing the ROI block
const ROI_END_KEY: &str = "hm_cutoff";

/// Layout of the positions CSV
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CsvLayout {
    /// Detect from the first line: a `track_id` header means long, otherwise wide
    #[default]
    Auto,
    /// Headerless, one row per frame, six columns per track; negative id = absent
    Ctrax,
    /// Header `track_id,frame_index,x,y`, one row per sample
    Long,
}

/// Read and parse a positions CSV file
pub fn read_positions(path: &Path, layout: CsvLayout) -> Result<Vec<PositionSample>> {
    let data = fs::read_to_string(path).map_err(|e| {
        MetricsError::InputFormat(format!("cannot read positions file {}: {}", path.display(), e))
    })?;
    parse_positions(&data, layout, &path.display().to_string())
}

/// Parse positions CSV content; `source` names the input in error messages
pub fn parse_positions(data: &str, layout: CsvLayout, source: &str) -> Result<Vec<PositionSample>> {
    let layout = match layout {
        CsvLayout::Auto => detect_layout(data),
        other => other,
    };

    let samples = match layout {
        CsvLayout::Long => parse_long(data, source)?,
        _ => parse_ctrax(data, source)?,
    };

    check_track_order(&samples, source)?;
    debug!(source, ?layout, samples = samples.len(), "parsed positions");
    Ok(samples)
}

fn detect_layout(data: &str) -> CsvLayout {
    let first = data.lines().find(|l| !l.trim().is_empty()).unwrap_or_default();
    if first.to_ascii_lowercase().contains("track_id") {
        CsvLayout::Long
    } else {
        CsvLayout::Ctrax
    }
}

fn parse_long(data: &str, source: &str) -> Result<Vec<PositionSample>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(data.as_bytes());

    let mut samples = Vec::new();
    for record in reader.deserialize::<PositionSample>() {
        let sample = record
            .map_err(|e| MetricsError::InputFormat(format!("{}: {}", source, e)))?;
        if !sample.x.is_finite() || !sample.y.is_finite() {
            return Err(MetricsError::InputFormat(format!(
                "{}: non-finite position for track {} at frame {}",
                source, sample.track_id, sample.frame_index
            )));
        }
        samples.push(sample);
    }
    Ok(samples)
}

fn parse_ctrax(data: &str, source: &str) -> Result<Vec<PositionSample>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(data.as_bytes());

    let mut samples = Vec::new();
    for (frame_index, record) in reader.records().enumerate() {
        let record = record.map_err(|e| MetricsError::InputFormat(format!("{}: {}", source, e)))?;
        let line = record.position().map(|p| p.line()).unwrap_or(frame_index as u64 + 1);

        for offset in (0..record.len()).step_by(CTRAX_COLUMNS_PER_TRACK) {
            let field = |i: usize| record.get(offset + i).unwrap_or_default();
            let id_field = field(0);
            if id_field.is_empty() {
                continue;
            }

            let id = parse_number(id_field, "track id", source, line)?;
            if id < 0.0 {
                continue;
            }
            if id.fract() != 0.0 {
                return Err(MetricsError::InputFormat(format!(
                    "{} line {}: track id '{}' is not an integer",
                    source, line, id_field
                )));
            }

            let x = parse_number(field(1), "x", source, line)?;
            let y = parse_number(field(2), "y", source, line)?;
            samples.push(PositionSample::new(id as i64, frame_index as u64, x, y));
        }
    }
    Ok(samples)
}

fn parse_number(field: &str, name: &str, source: &str, line: u64) -> Result<f64> {
    match field.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(MetricsError::InputFormat(format!(
            "{} line {}: invalid {} '{}'",
            source, line, name, field
        ))),
    }
}

/// Frame indices must strictly increase within each track
fn check_track_order(samples: &[PositionSample], source: &str) -> Result<()> {
    let mut last_frame: HashMap<i64, u64> = HashMap::new();
    for sample in samples {
        if let Some(previous) = last_frame.insert(sample.track_id, sample.frame_index) {
            if sample.frame_index <= previous {
                return Err(MetricsError::InputFormat(format!(
                    "{}: track {} frame {} does not follow frame {}",
                    source, sample.track_id, sample.frame_index, previous
                )));
            }
        }
    }
    Ok(())
}

/// Read and parse an annotation file
pub fn read_annotation(path: &Path) -> Result<Annotation> {
    let data = fs::read_to_string(path).map_err(|e| {
        MetricsError::InputFormat(format!(
            "cannot read annotation file {}: {}",
            path.display(),
            e
        ))
    })?;
    parse_annotation(&data, &path.display().to_string())
}

/// Parse annotation content.
///
/// Header lines are `key:value`. The ROI is either given inline as JSON
/// (`roipolygons:[[[x,y],...]]`) or as a block of vertex lines (`x y` or `x,y`)
/// between a bare `roipolygons` line and the `hm_cutoff` line, with blank lines
/// separating polygons.
pub fn parse_annotation(data: &str, source: &str) -> Result<Annotation> {
    let mut annotation = Annotation::default();
    let mut lines = data.lines().enumerate();

    while let Some((index, raw)) = lines.next() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        let (key, value) = match line.split_once(':') {
            Some((k, v)) => (k.trim(), v.trim()),
            None => (line, ""),
        };

        if key != ROI_KEY {
            if key == ROI_END_KEY || !value.is_empty() {
                annotation
                    .parameters
                    .push((key.to_string(), value.to_string()));
            }
            continue;
        }

        if !value.is_empty() {
            let polygons: Vec<Vec<[f64; 2]>> = serde_json::from_str(value).map_err(|e| {
                MetricsError::InputFormat(format!(
                    "{} line {}: invalid inline ROI: {}",
                    source,
                    index + 1,
                    e
                ))
            })?;
            annotation.roi_polygons = polygons
                .into_iter()
                .map(|p| p.into_iter().map(|[x, y]| Point { x, y }).collect())
                .collect();
            continue;
        }

        let mut current: Vec<Point> = Vec::new();
        let mut closed = false;
        for (index, raw) in lines.by_ref() {
            let line = raw.trim();
            if line.starts_with(ROI_END_KEY) {
                if let Some((k, v)) = line.split_once(':') {
                    annotation
                        .parameters
                        .push((k.trim().to_string(), v.trim().to_string()));
                }
                closed = true;
                break;
            }
            if line.is_empty() {
                if !current.is_empty() {
                    annotation.roi_polygons.push(std::mem::take(&mut current));
                }
                continue;
            }
            current.push(parse_vertex(line, source, index + 1)?);
        }
        if !current.is_empty() {
            annotation.roi_polygons.push(current);
        }
        if !closed {
            warn!(source, "ROI block not terminated by '{}'", ROI_END_KEY);
        }
    }

    debug!(
        source,
        parameters = annotation.parameters.len(),
        polygons = annotation.roi_polygons.len(),
        "parsed annotation"
    );
    Ok(annotation)
}

fn parse_vertex(line: &str, source: &str, line_number: usize) -> Result<Point> {
    let coords: Vec<&str> = line
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .collect();

    let invalid = || {
        MetricsError::InputFormat(format!(
            "{} line {}: invalid ROI vertex '{}'",
            source, line_number, line
        ))
    };

    if coords.len() != 2 {
        return Err(invalid());
    }
    let x: f64 = coords[0].parse().map_err(|_| invalid())?;
    let y: f64 = coords[1].parse().map_err(|_| invalid())?;
    if !x.is_finite() || !y.is_finite() {
        return Err(invalid());
    }
    Ok(Point { x, y })
}
