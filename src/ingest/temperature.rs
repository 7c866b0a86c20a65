//! Temperature log ingest.
//!
//! The temperature logger runs 24/7 and writes one CSV row per image-style
//! filename (`deploymentID_YYYYMMDDHHMMSS...`) with the ambient reading. The
//! file serves two purposes: a per-image join onto the butterfly
//! observations (by exact filename match), and a full day-and-night series
//! the dynamic window queries run over.

use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::path::Path;

use crate::logging::{self, Stage};
use crate::model::{Observation, PipelineError, TempReading};

/// The two views of the temperature file produced by one pass over it.
pub struct TemperatureData {
    /// Exact filename → reading, for the per-image join.
    pub by_filename: HashMap<String, f64>,
    /// Full 24/7 series for window queries, with deployment and timestamp
    /// recovered from the filename. Rows whose filename does not yield both
    /// are dropped.
    pub series: Vec<TempReading>,
}

/// Split a temperature filename into (deployment_id, timestamp).
///
/// Format is `deploymentID_YYYYMMDDHHMMSS...`: everything before the first
/// underscore, which must be immediately followed by 14 digits. Deployment
/// ids that themselves contain underscores do not fit this format and yield
/// `None` — their rows drop out of the 24/7 series, matching the upstream
/// logger's naming contract.
fn split_temp_filename(filename: &str) -> Option<(&str, NaiveDateTime)> {
    let (deployment, rest) = filename.split_once('_')?;
    // A multibyte character straddling byte 14 makes the slice invalid, so
    // the boundary check has to come before taking the token.
    if deployment.is_empty() || rest.len() < 14 || !rest.is_char_boundary(14) {
        return None;
    }
    let token = &rest[..14];
    if !token.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let timestamp = NaiveDateTime::parse_from_str(token, "%Y%m%d%H%M%S").ok()?;
    Some((deployment, timestamp))
}

/// Load the temperature CSV. Requires `filename` and `temperature` columns;
/// any other columns are ignored. Blank or non-numeric readings are treated
/// as missing.
pub fn load_temperature(path: &Path) -> Result<TemperatureData, PipelineError> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| match e.kind() {
        csv::ErrorKind::Io(_) => PipelineError::Io {
            path: path.display().to_string(),
            source: std::io::Error::other(e.to_string()),
        },
        _ => PipelineError::Malformed {
            path: path.display().to_string(),
            detail: e.to_string(),
        },
    })?;

    let headers = reader
        .headers()
        .map_err(|e| PipelineError::Malformed {
            path: path.display().to_string(),
            detail: e.to_string(),
        })?
        .clone();
    let filename_idx = column_index(&headers, "filename").ok_or_else(|| {
        PipelineError::Malformed {
            path: path.display().to_string(),
            detail: "missing required column 'filename'".to_string(),
        }
    })?;
    let temp_idx = column_index(&headers, "temperature").ok_or_else(|| {
        PipelineError::Malformed {
            path: path.display().to_string(),
            detail: "missing required column 'temperature'".to_string(),
        }
    })?;

    let mut by_filename = HashMap::new();
    let mut series = Vec::new();

    for record in reader.records() {
        let record = record.map_err(|e| PipelineError::Malformed {
            path: path.display().to_string(),
            detail: e.to_string(),
        })?;

        let filename = match record.get(filename_idx) {
            Some(f) if !f.is_empty() => f,
            _ => continue,
        };
        let Some(temperature) = record.get(temp_idx).and_then(|t| t.trim().parse::<f64>().ok())
        else {
            continue;
        };

        by_filename.insert(filename.to_string(), temperature);

        if let Some((deployment_id, timestamp)) = split_temp_filename(filename) {
            series.push(TempReading {
                deployment_id: deployment_id.to_string(),
                timestamp,
                temperature,
            });
        }
    }

    logging::info(
        Stage::Temperature,
        None,
        &format!("Loaded {} temperature records", by_filename.len()),
    );

    Ok(TemperatureData { by_filename, series })
}

fn column_index(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|h| h.trim_start_matches('\u{feff}') == name)
}

/// Left-join temperature readings onto observations by exact filename
/// match. Misses are counted and warned about, never fatal — the window
/// queries use the 24/7 series and do not depend on this join.
pub fn attach_temperatures(observations: &mut [Observation], data: &TemperatureData) {
    let mut missing = 0usize;
    for obs in observations.iter_mut() {
        match data.by_filename.get(&obs.image_filename) {
            Some(&t) => obs.temperature = Some(t),
            None => missing += 1,
        }
    }

    if missing > 0 {
        logging::warn(
            Stage::Temperature,
            None,
            &format!("{} observations missing temperature data", missing),
        );
    }
    logging::info(Stage::Temperature, None, "Temperature data joined");
}
