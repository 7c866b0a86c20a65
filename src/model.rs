//! Core data types for the monarch lag-dataset preparation pipeline.
//!
//! This module defines the shared domain model imported by all other modules.
//! It contains no logic, no I/O, and no external dependencies beyond chrono —
//! only types.

use chrono::{NaiveDate, NaiveDateTime};

// ---------------------------------------------------------------------------
// Observation types
// ---------------------------------------------------------------------------

/// A single classified camera image, reduced to per-image totals.
///
/// Produced by `ingest::counts` from one entry in a deployment's
/// classification JSON. The `temperature` field starts out `None` and is
/// filled in by `ingest::temperature::attach_temperatures` where a matching
/// record exists in the temperature log.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub deployment_id: String,
    pub image_filename: String,
    pub timestamp: NaiveDateTime,
    pub date: NaiveDate,
    /// Sum of all grid-cell counts in the image.
    pub total_butterflies: f64,
    /// Sum of counts from cells flagged as being in direct sun.
    pub butterflies_direct_sun: f64,
    /// True if the source flagged the image as night OR the timestamp falls
    /// inside a configured night period for the deployment.
    pub is_night: bool,
    /// Ambient temperature at capture time, if the logger recorded one.
    pub temperature: Option<f64>,
}

/// One reading from the 24/7 ambient temperature log.
///
/// Unlike `Observation.temperature` (which only covers image capture times),
/// this series spans day and night and is what the window queries run over.
#[derive(Debug, Clone, PartialEq)]
pub struct TempReading {
    pub deployment_id: String,
    pub timestamp: NaiveDateTime,
    pub temperature: f64,
}

// ---------------------------------------------------------------------------
// Daily aggregates
// ---------------------------------------------------------------------------

/// Wind summary statistics over a time window.
///
/// Shared between the per-day "lite" stats (06:00–18:00 of one date) and the
/// dynamic lag-window stats. Gust statistics are `None` when no gust reading
/// in the window parsed; `obs_count` and `coverage` count the rows the meter
/// logged whether or not they parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct WindStats {
    /// Mean of sustained speed readings (m/s).
    pub avg_sustained: Option<f64>,
    pub max_gust: Option<f64>,
    pub gust_sum: Option<f64>,
    /// Sum of gust readings strictly above 2 m/s.
    pub gust_sum_above_2ms: Option<f64>,
    /// Sum of per-minute gust readings divided by 60 — an integral
    /// approximation assuming 1-minute sampling.
    pub gust_hours: Option<f64>,
    /// Number of gust readings at or above 2 m/s.
    pub minutes_above_2ms: usize,
    /// Sample standard deviation of gusts; needs at least two readings.
    pub gust_sd: Option<f64>,
    /// Most frequent gust value after rounding to the nearest 0.5 m/s bin.
    /// Ties resolve to the smallest bin.
    pub mode_gust: Option<f64>,
    /// Rows the meter logged in the window, parsed or not.
    pub obs_count: usize,
    /// min(1, logged rows / expected) assuming one reading per minute.
    pub coverage: f64,
}

impl WindStats {
    /// The all-missing result used when a store is absent, a query fails, or
    /// the window contains no logged rows at all.
    pub fn empty() -> Self {
        WindStats {
            avg_sustained: None,
            max_gust: None,
            gust_sum: None,
            gust_sum_above_2ms: None,
            gust_hours: None,
            minutes_above_2ms: 0,
            gust_sd: None,
            mode_gust: None,
            obs_count: 0,
            coverage: 0.0,
        }
    }
}

/// One (deployment, date) row of the daily aggregate table.
///
/// Only days with at least one daytime observation produce an aggregate.
/// Invariant: `time_of_max` is the timestamp of the first observation (in
/// time order) achieving `max_butterflies` among that day's daytime
/// observations.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyAggregate {
    pub deployment_id: String,
    pub date: NaiveDate,
    /// Number of daytime observations contributing to this day.
    pub photo_count: usize,
    pub max_butterflies: f64,
    pub butterflies_95th_percentile: f64,
    /// Mean of the 3 largest per-observation totals, zero-padded when the
    /// day has fewer than 3 observations.
    pub butterflies_top3_mean: f64,
    pub sum_butterflies_direct_sun: f64,
    pub time_of_max: NaiveDateTime,
    /// Temperature recorded on the image that achieved the max count.
    pub temp_at_max: Option<f64>,
    /// Last daytime observation time — the functional sunset proxy.
    pub last_observation_time: NaiveDateTime,
    pub temp_max: Option<f64>,
    pub temp_min: Option<f64>,
    pub temp_mean: Option<f64>,
    /// Count of readings >= 15 °C times 0.5 h (30-minute sampling).
    pub hours_above_15c: f64,
    /// Sum of (reading − 15) × 0.5 h over readings above 15 °C.
    pub degree_hours_above_15c: f64,
    /// Whole days since the configured season start date.
    pub days_since_season_start: i64,
    /// 1-based chronological rank of this day within its deployment.
    pub day_sequence: u32,
    /// Daytime (06:00–18:00) wind summary for this date, when a store exists.
    pub daily_wind: WindStats,
}

// ---------------------------------------------------------------------------
// Lag pairs
// ---------------------------------------------------------------------------

/// Which rule defines the end of a lag pair's weather window.
///
/// The start is always the previous day's time of max count; the research
/// hypothesis is that weather between yesterday's peak activity and some
/// horizon predicts today's outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowMode {
    /// Window ends exactly 24 hours after it starts.
    Fixed24h,
    /// Window ends at the current day's last daytime observation
    /// (functional sunset).
    Sunset,
}

impl WindowMode {
    pub fn label(&self) -> &'static str {
        match self {
            WindowMode::Fixed24h => "24hr",
            WindowMode::Sunset => "sunset",
        }
    }
}

/// One day-over-day comparison row: day t against day t−1 within a single
/// deployment, with weather predictors aggregated over the lag window.
#[derive(Debug, Clone, PartialEq)]
pub struct LagPair {
    // Identifiers
    pub deployment_id: String,
    pub deployment_day_id_t: String,
    pub deployment_day_id_t_1: String,
    pub date_t: NaiveDate,
    pub date_t_1: NaiveDate,
    /// 1-based position of day t within the deployment's valid-day list.
    pub observation_order_t: usize,
    pub day_sequence: u32,

    // Window metadata
    pub window_start: NaiveDateTime,
    pub window_end: NaiveDateTime,
    pub lag_duration_hours: f64,
    /// Geometric mean of the three component coverages; in [0, 1].
    pub metrics_complete: f64,
    pub temp_data_coverage: f64,
    pub wind_data_coverage: f64,
    pub butterfly_data_coverage: f64,

    // Current day (t) count metrics
    pub max_butterflies_t: f64,
    pub butterflies_95th_percentile_t: f64,
    pub butterflies_top3_mean_t: f64,
    pub sum_butterflies_direct_sun_t: f64,
    pub time_of_max_t: NaiveDateTime,

    // Previous day (t−1) count metrics
    pub max_butterflies_t_1: f64,
    pub butterflies_95th_percentile_t_1: f64,
    pub butterflies_top3_mean_t_1: f64,
    pub time_of_max_t_1: NaiveDateTime,

    // Window-aggregated temperature predictors
    pub temp_max: Option<f64>,
    pub temp_min: Option<f64>,
    pub temp_mean: Option<f64>,
    /// Single-point reading at the previous day's max count.
    pub temp_at_max_count_t_1: Option<f64>,
    pub hours_above_15c: Option<f64>,
    pub degree_hours_above_15c: Option<f64>,

    // Window-aggregated wind predictors
    pub wind_avg_sustained: Option<f64>,
    pub wind_max_gust: Option<f64>,
    pub wind_gust_sum: Option<f64>,
    pub wind_gust_sum_above_2ms: Option<f64>,
    pub wind_gust_hours: Option<f64>,
    pub wind_minutes_above_2ms: usize,
    pub wind_gust_sd: Option<f64>,
    pub wind_mode_gust: Option<f64>,

    // Sun exposure over the window (daylight observations only)
    pub sum_butterflies_direct_sun: f64,

    // Temporal
    pub days_since_season_start_t: i64,

    // Response variables: raw difference plus two sign-preserving
    // transforms, for each of the three count summaries.
    pub butterfly_diff: f64,
    pub butterfly_diff_cbrt: f64,
    pub butterfly_diff_log: f64,
    pub butterfly_diff_95th: f64,
    pub butterfly_diff_95th_cbrt: f64,
    pub butterfly_diff_95th_log: f64,
    pub butterfly_diff_top3: f64,
    pub butterfly_diff_top3_cbrt: f64,
    pub butterfly_diff_top3_log: f64,

    // Deployment metadata (left-joined; None when the metadata table lacks
    // the row or the column)
    pub observer: Option<String>,
    pub horizontal_dist_to_cluster_m: Option<f64>,
    pub grove: Option<String>,
    pub view_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that abort a pipeline run.
///
/// Degradable conditions (missing wind store, empty query window, absent
/// temperature record) are deliberately NOT represented here — they produce
/// missing sentinels and a coverage of 0 instead.
#[derive(Debug)]
pub enum PipelineError {
    /// A count label matched no known pattern and did not parse as a number.
    /// Unparseable count data indicates a logic bug upstream, so this is
    /// fatal rather than skippable.
    CountParse(String),
    /// A required input file or directory was missing or unreadable.
    Io { path: String, source: std::io::Error },
    /// A required input file had an unusable structure (bad JSON, CSV
    /// missing mandatory columns).
    Malformed { path: String, detail: String },
    /// Processing produced zero usable rows where at least one is required.
    EmptyDataset(String),
    /// The final lag-pair table came out empty — an empty output is never
    /// useful, so the run fails.
    EmptyOutput(String),
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::CountParse(label) => {
                write!(f, "Cannot parse count value: '{}'", label)
            }
            PipelineError::Io { path, source } => {
                write!(f, "I/O error on {}: {}", path, source)
            }
            PipelineError::Malformed { path, detail } => {
                write!(f, "Malformed input {}: {}", path, detail)
            }
            PipelineError::EmptyDataset(what) => {
                write!(f, "No usable data: {}", what)
            }
            PipelineError::EmptyOutput(what) => {
                write!(f, "Empty result: {}", what)
            }
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_mode_labels_are_distinct() {
        assert_eq!(WindowMode::Fixed24h.label(), "24hr");
        assert_eq!(WindowMode::Sunset.label(), "sunset");
    }

    #[test]
    fn test_empty_wind_stats_have_zero_coverage() {
        let stats = WindStats::empty();
        assert_eq!(stats.coverage, 0.0);
        assert_eq!(stats.obs_count, 0);
        assert!(stats.max_gust.is_none());
        assert!(stats.mode_gust.is_none());
    }

    #[test]
    fn test_pipeline_error_display_includes_offending_label() {
        let err = PipelineError::CountParse("lots".to_string());
        assert!(err.to_string().contains("'lots'"));
    }
}
