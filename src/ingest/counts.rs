//! Classification-JSON ingest.
//!
//! Each deployment ships one JSON file of per-image butterfly counts, keyed
//! by image filename. Two shapes exist in the field data: the map may sit at
//! the top level, or one level down under a `classifications` key. Both are
//! normalized into one canonical shape at this boundary before any other
//! logic runs.
//!
//! Counts arrive as categorical text labels ("10-99", "1000+") recorded by
//! observers; they map to conservative minimum values. Filenames embed a
//! 14-digit capture timestamp (`YYYYMMDDHHMMSS`); images without one are
//! skipped, not errors.

use chrono::NaiveDateTime;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::config::Config;
use crate::logging::{self, Stage};
use crate::model::{Observation, PipelineError};

// ---------------------------------------------------------------------------
// JSON record structures
// ---------------------------------------------------------------------------

/// One grid cell of one classified image.
#[derive(Debug, Deserialize)]
pub struct CellRecord {
    /// Count label. May be a JSON string ("10-99") or a bare number; absent
    /// means zero.
    #[serde(default)]
    pub count: Option<serde_json::Value>,
    #[serde(default, rename = "directSun")]
    pub direct_sun: bool,
}

/// One classified image: its night flag and per-cell counts.
#[derive(Debug, Deserialize)]
pub struct ImageRecord {
    #[serde(default, rename = "isNight")]
    pub is_night: bool,
    #[serde(default)]
    pub cells: HashMap<String, CellRecord>,
}

/// Normalize the two field-data JSON shapes into the canonical
/// filename → record map.
///
/// Accepts either `{ "classifications": { "img.jpg": {...}, ... } }` or the
/// flat `{ "img.jpg": {...}, ... }`.
pub fn normalize_classifications(
    value: serde_json::Value,
) -> Result<HashMap<String, ImageRecord>, serde_json::Error> {
    let inner = match value {
        serde_json::Value::Object(mut map) => match map.remove("classifications") {
            Some(nested) => nested,
            None => serde_json::Value::Object(map),
        },
        other => other,
    };
    serde_json::from_value(inner)
}

// ---------------------------------------------------------------------------
// Count label parsing
// ---------------------------------------------------------------------------

/// Map a categorical count label to a numeric value.
///
/// Range labels use the conservative minimum ("10-99" → 10), "N+" labels use
/// the threshold, and anything else must parse as a literal number. An
/// unrecognized label is a fatal error: unparseable count data means the
/// upstream labeling changed and the mapping needs review.
pub fn parse_count_label(label: &str) -> Result<f64, PipelineError> {
    let s = label.trim();

    // Known field-protocol labels
    match s {
        "0" => return Ok(0.0),
        "1-9" => return Ok(1.0),
        "10-99" => return Ok(10.0),
        "100-999" => return Ok(100.0),
        "1000+" => return Ok(1000.0),
        _ => {}
    }

    // Generic range pattern: use the minimum
    if let Some((lo, hi)) = s.split_once('-') {
        if is_digits(lo) && is_digits(hi) {
            if let Ok(v) = lo.parse::<f64>() {
                return Ok(v);
            }
        }
    }

    // Generic plus pattern: use the threshold
    if let Some(prefix) = s.strip_suffix('+') {
        if is_digits(prefix) {
            if let Ok(v) = prefix.parse::<f64>() {
                return Ok(v);
            }
        }
    }

    s.parse::<f64>()
        .map_err(|_| PipelineError::CountParse(label.to_string()))
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

/// Stringify whatever JSON value sits in a cell's `count` field so it can go
/// through the label parser. Absent or null counts as "0".
fn count_label_of(value: &Option<serde_json::Value>) -> String {
    match value {
        None | Some(serde_json::Value::Null) => "0".to_string(),
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Timestamp extraction
// ---------------------------------------------------------------------------

/// Extract the capture timestamp from an image filename.
///
/// Finds the first contiguous run of at least 14 digits anywhere in the
/// string and parses its leading 14 digits as `YYYYMMDDHHMMSS`. Returns
/// `None` when no such run exists or it is not a valid datetime — callers
/// treat that as "skip this observation".
pub fn extract_timestamp(filename: &str) -> Option<NaiveDateTime> {
    let bytes = filename.as_bytes();
    let mut run_start = None;

    for (i, b) in bytes.iter().enumerate() {
        if b.is_ascii_digit() {
            let start = *run_start.get_or_insert(i);
            if i + 1 - start == 14 {
                let token = &filename[start..start + 14];
                return NaiveDateTime::parse_from_str(token, "%Y%m%d%H%M%S").ok();
            }
        } else {
            run_start = None;
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Cell aggregation
// ---------------------------------------------------------------------------

/// Sum an image's per-cell counts into (total, direct-sun total).
pub fn process_cells(cells: &HashMap<String, CellRecord>) -> Result<(f64, f64), PipelineError> {
    let mut total = 0.0;
    let mut direct_sun = 0.0;

    for cell in cells.values() {
        let count = parse_count_label(&count_label_of(&cell.count))?;
        total += count;
        if cell.direct_sun {
            direct_sun += count;
        }
    }

    Ok((total, direct_sun))
}

// ---------------------------------------------------------------------------
// Deployment directory processing
// ---------------------------------------------------------------------------

/// Process every deployment JSON file in `json_dir` into observations.
///
/// Deployment id is the file stem. Night filtering ORs the record's own
/// `isNight` flag with the configured night intervals; downsampling applies
/// to daytime images only. Output is sorted by (deployment, timestamp).
pub fn process_deployments(
    json_dir: &Path,
    config: &Config,
) -> Result<Vec<Observation>, PipelineError> {
    let entries = std::fs::read_dir(json_dir).map_err(|e| PipelineError::Io {
        path: json_dir.display().to_string(),
        source: e,
    })?;

    let mut json_files: Vec<_> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    json_files.sort();

    if json_files.is_empty() {
        return Err(PipelineError::EmptyDataset(format!(
            "no JSON files found in {}",
            json_dir.display()
        )));
    }

    let mut observations = Vec::new();

    for json_file in &json_files {
        let deployment_id = json_file
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        logging::info(Stage::Counts, Some(&deployment_id), &format!("Processing {}...", deployment_id));

        let text = std::fs::read_to_string(json_file).map_err(|e| PipelineError::Io {
            path: json_file.display().to_string(),
            source: e,
        })?;
        let value: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| PipelineError::Malformed {
                path: json_file.display().to_string(),
                detail: e.to_string(),
            })?;
        let classifications =
            normalize_classifications(value).map_err(|e| PipelineError::Malformed {
                path: json_file.display().to_string(),
                detail: e.to_string(),
            })?;

        for (image_filename, record) in &classifications {
            let Some(timestamp) = extract_timestamp(image_filename) else {
                continue;
            };

            let is_night = record.is_night || config.is_night(&deployment_id, timestamp);

            // Downsampling only thins the daytime series; night images are
            // already excluded from daytime analysis.
            if !is_night && config.should_downsample(&deployment_id, timestamp) {
                continue;
            }

            let (total_butterflies, butterflies_direct_sun) = process_cells(&record.cells)?;

            observations.push(Observation {
                deployment_id: deployment_id.clone(),
                image_filename: image_filename.clone(),
                timestamp,
                date: timestamp.date(),
                total_butterflies,
                butterflies_direct_sun,
                is_night,
                temperature: None,
            });
        }
    }

    if observations.is_empty() {
        return Err(PipelineError::EmptyDataset(
            "no valid butterfly count data found".to_string(),
        ));
    }

    observations.sort_by(|a, b| {
        (a.deployment_id.as_str(), a.timestamp, a.image_filename.as_str()).cmp(&(
            b.deployment_id.as_str(),
            b.timestamp,
            b.image_filename.as_str(),
        ))
    });

    let night_count = observations.iter().filter(|o| o.is_night).count();
    logging::info(
        Stage::Counts,
        None,
        &format!(
            "Processed {} butterfly observations from {} deployments",
            observations.len(),
            json_files.len()
        ),
    );
    logging::info(
        Stage::Counts,
        None,
        &format!(
            "  - Daytime observations: {}\n  - Night observations: {}",
            observations.len() - night_count,
            night_count
        ),
    );

    Ok(observations)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
