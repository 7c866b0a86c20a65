//! Wind store access.
//!
//! Each wind meter writes a standalone SQLite database (`.s3db`) containing a
//! `Wind` table with per-minute `time`, `speed` and `gust` columns. Stores are
//! discovered by scanning a directory and keyed by file stem, which the
//! deployment metadata references through its `wind_meter_name` column.
//!
//! Field units sometimes log speeds as text, with stray whitespace or
//! outright garbage. Readings are coerced leniently: numeric values pass
//! through, trimmed numeric strings parse, everything else becomes missing.
//! Store-level failures never abort the run; callers substitute
//! `WindStats::empty()` and move on.

use chrono::NaiveDateTime;
use rusqlite::Connection;
use rusqlite::types::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::logging::{self, Stage};
use crate::model::PipelineError;

/// One row of a `Wind` table after numeric coercion. Either reading may be
/// missing independently; only `gust` drives the headline statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindSample {
    pub speed: Option<f64>,
    pub gust: Option<f64>,
}

// ---------------------------------------------------------------------------
// Store discovery
// ---------------------------------------------------------------------------

/// Scan `dir` for `.s3db` files and key them by file stem. A missing or
/// empty directory is not an error; deployments simply get no wind data.
pub fn discover_stores(dir: &Path) -> Result<HashMap<String, PathBuf>, PipelineError> {
    let mut stores = HashMap::new();

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            logging::warn(
                Stage::Wind,
                None,
                &format!("Wind store directory {} not found", dir.display()),
            );
            return Ok(stores);
        }
        Err(e) => {
            return Err(PipelineError::Io {
                path: dir.display().to_string(),
                source: e,
            });
        }
    };

    for entry in entries {
        let entry = entry.map_err(|e| PipelineError::Io {
            path: dir.display().to_string(),
            source: e,
        })?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("s3db") {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            stores.insert(stem.to_string(), path.clone());
        }
    }

    logging::info(
        Stage::Wind,
        None,
        &format!("Found {} wind stores in {}", stores.len(), dir.display()),
    );
    Ok(stores)
}

// ---------------------------------------------------------------------------
// Window queries
// ---------------------------------------------------------------------------

/// Pull all samples whose time falls in `[start, end]`, in time order.
///
/// Returns the raw rusqlite error so callers can log it with the deployment
/// context and degrade to `WindStats::empty()`.
pub fn query_window(
    db_path: &Path,
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> Result<Vec<WindSample>, rusqlite::Error> {
    let conn = Connection::open(db_path)?;
    let mut stmt = conn
        .prepare("SELECT time, speed, gust FROM Wind WHERE time BETWEEN ?1 AND ?2 ORDER BY time")?;

    let start_s = start.format("%Y-%m-%d %H:%M:%S").to_string();
    let end_s = end.format("%Y-%m-%d %H:%M:%S").to_string();

    let rows = stmt.query_map([start_s, end_s], |row| {
        let speed: Value = row.get(1)?;
        let gust: Value = row.get(2)?;
        Ok(WindSample {
            speed: coerce_reading(&speed),
            gust: coerce_reading(&gust),
        })
    })?;

    rows.collect()
}

/// Turn a raw SQLite value into a reading. Text is trimmed and parsed;
/// anything unparseable is missing rather than an error.
fn coerce_reading(value: &Value) -> Option<f64> {
    match value {
        Value::Real(r) => Some(*r),
        Value::Integer(i) => Some(*i as f64),
        Value::Text(t) => t.trim().parse::<f64>().ok(),
        Value::Null | Value::Blob(_) => None,
    }
}
