//! Batch preparation of monarch butterfly lag datasets.
//!
//! Overwintering monarch clusters are photographed on a 30-minute cadence
//! and the images hand-classified into per-grid-cell counts. This crate
//! turns those classification JSON files, the co-located temperature logs
//! and wind-meter SQLite stores into day-over-day "lag" tables: each row
//! compares a day's butterfly counts against the previous day's, with
//! weather aggregated over a window anchored at the previous day's peak.
//!
//! The pipeline runs as a batch job over a season's data directory:
//!
//! 1. ingest classification JSON into per-image observations,
//! 2. join temperature readings and flag night images,
//! 3. aggregate to one row per deployment-day,
//! 4. filter to days with a plausible photo count,
//! 5. pair consecutive days and aggregate weather over each lag window,
//! 6. write the daily and lag CSV tables.

pub mod analysis;
pub mod config;
pub mod deployments;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod output;

use std::collections::HashMap;
use std::path::PathBuf;

use crate::config::Config;
use crate::deployments::DeploymentTable;
use crate::logging::Stage;
use crate::model::{PipelineError, WindowMode};

/// Inputs and outputs for one pipeline run. Outputs set to `None` are
/// skipped.
pub struct RunOptions {
    pub json_dir: PathBuf,
    pub temp_file: PathBuf,
    pub wind_db_dir: Option<PathBuf>,
    pub deployments_file: Option<PathBuf>,
    pub output_daily: Option<PathBuf>,
    pub output_24hr: Option<PathBuf>,
    pub output_sunset: Option<PathBuf>,
    pub config: Config,
}

/// Run the full pipeline: ingest, aggregate, pair, write.
///
/// Weather problems degrade to missing fields; structural problems (missing
/// inputs, zero usable observations, an empty lag table) abort with an
/// error.
pub fn run(options: &RunOptions) -> Result<(), PipelineError> {
    let config = &options.config;

    // Ingest.
    let mut observations = ingest::counts::process_deployments(&options.json_dir, config)?;
    let temperature = ingest::temperature::load_temperature(&options.temp_file)?;
    ingest::temperature::attach_temperatures(&mut observations, &temperature);

    let metadata = match &options.deployments_file {
        Some(path) => DeploymentTable::load(path)?,
        None => {
            logging::warn(
                Stage::Metadata,
                None,
                "No deployments file; metadata columns will be blank",
            );
            DeploymentTable::empty()
        }
    };

    let wind_stores = match &options.wind_db_dir {
        Some(dir) => {
            let stores = ingest::wind::discover_stores(dir)?;
            metadata.wind_store_paths(&stores)
        }
        None => HashMap::new(),
    };

    // Aggregate.
    let mut aggregates = analysis::daily::aggregate_daily(&observations, config)?;
    analysis::daily::attach_daily_wind(&mut aggregates, &wind_stores);
    if let Some(path) = &options.output_daily {
        output::write_daily_csv(path, &aggregates)?;
    }

    let valid_days = analysis::daily::filter_valid_days(aggregates, config);

    // Pair and write, once per requested window mode.
    let mode_outputs = [
        (WindowMode::Fixed24h, &options.output_24hr),
        (WindowMode::Sunset, &options.output_sunset),
    ];
    for (mode, output_path) in mode_outputs {
        let Some(path) = output_path else { continue };
        let pairs = analysis::lag::build_lag_pairs(
            &valid_days,
            &observations,
            &temperature.series,
            &wind_stores,
            &metadata,
            mode,
        )?;
        output::write_lag_csv(path, &pairs)?;
    }

    logging::info(Stage::System, None, "✅ Pipeline complete");
    Ok(())
}
