//! Weather aggregation over arbitrary time windows.
//!
//! A lag pair's window runs from the previous day's time of max count to
//! either +24 hours or the current day's functional sunset; the daily wind
//! summary uses a fixed 06:00–18:00 window. All window membership checks are
//! inclusive on both ends. Each aggregate carries a coverage fraction so a
//! window with patchy sensor data can be down-weighted or dropped downstream
//! instead of silently passing as complete.

use chrono::NaiveDateTime;

use crate::analysis::stats;
use crate::ingest::wind::WindSample;
use crate::model::{Observation, TempReading, WindStats};

// ---------------------------------------------------------------------------
// Temperature
// ---------------------------------------------------------------------------

/// Temperature summary over one window of the 24/7 logger series.
#[derive(Debug, Clone, PartialEq)]
pub struct TempWindowMetrics {
    pub temp_max: Option<f64>,
    pub temp_min: Option<f64>,
    pub temp_mean: Option<f64>,
    /// Count of readings >= 15 °C times 0.5 h (30-minute sampling).
    pub hours_above_15c: Option<f64>,
    /// Sum of (reading − 15) × 0.5 h over readings above 15 °C.
    pub degree_hours_above_15c: Option<f64>,
    /// min(1, observed / expected) at two readings per hour.
    pub coverage: f64,
}

impl TempWindowMetrics {
    pub fn empty() -> Self {
        TempWindowMetrics {
            temp_max: None,
            temp_min: None,
            temp_mean: None,
            hours_above_15c: None,
            degree_hours_above_15c: None,
            coverage: 0.0,
        }
    }
}

/// Aggregate the deployment's 24/7 temperature series over `[start, end]`.
/// `series` must already be filtered to the deployment of interest.
pub fn temperature_window(
    series: &[TempReading],
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> TempWindowMetrics {
    let hours = window_hours(start, end);
    if hours <= 0.0 {
        return TempWindowMetrics::empty();
    }

    let readings: Vec<f64> = series
        .iter()
        .filter(|r| start <= r.timestamp && r.timestamp <= end)
        .map(|r| r.temperature)
        .collect();
    if readings.is_empty() {
        return TempWindowMetrics::empty();
    }

    let max = readings.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let min = readings.iter().cloned().fold(f64::INFINITY, f64::min);
    let above = readings.iter().filter(|&&t| t >= 15.0).count();
    let degree_hours: f64 = readings
        .iter()
        .filter(|&&t| t > 15.0)
        .map(|&t| (t - 15.0) * 0.5)
        .sum();

    // The logger samples every 30 minutes, so a fully covered window holds
    // two readings per hour.
    let expected = hours * 2.0;
    let coverage = (readings.len() as f64 / expected).min(1.0);

    TempWindowMetrics {
        temp_max: Some(max),
        temp_min: Some(min),
        temp_mean: stats::mean(&readings),
        hours_above_15c: Some(above as f64 * 0.5),
        degree_hours_above_15c: Some(degree_hours),
        coverage,
    }
}

// ---------------------------------------------------------------------------
// Wind
// ---------------------------------------------------------------------------

/// Summarize wind samples drawn from a window spanning `duration_hours`.
///
/// Gust statistics need at least one usable gust reading; sustained speed is
/// averaged independently. `obs_count` and coverage count the rows the meter
/// logged, parsed or not, at its one-reading-per-minute cadence — a garbled
/// reading is still evidence the meter was running.
pub fn wind_stats(samples: &[WindSample], duration_hours: f64) -> WindStats {
    if duration_hours <= 0.0 || samples.is_empty() {
        return WindStats::empty();
    }

    let speeds: Vec<f64> = samples.iter().filter_map(|s| s.speed).collect();
    let gusts: Vec<f64> = samples.iter().filter_map(|s| s.gust).collect();

    let gust_sum: f64 = gusts.iter().sum();
    let has_gusts = !gusts.is_empty();

    let expected = duration_hours * 60.0;
    let coverage = (samples.len() as f64 / expected).min(1.0);

    WindStats {
        avg_sustained: stats::mean(&speeds),
        max_gust: gusts.iter().cloned().reduce(f64::max),
        gust_sum: has_gusts.then_some(gust_sum),
        gust_sum_above_2ms: has_gusts
            .then(|| gusts.iter().filter(|&&g| g > 2.0).sum()),
        // Per-minute readings integrate to hours by dividing by 60.
        gust_hours: has_gusts.then_some(gust_sum / 60.0),
        minutes_above_2ms: gusts.iter().filter(|&&g| g >= 2.0).count(),
        gust_sd: stats::sample_std_dev(&gusts),
        mode_gust: stats::modal_value(&gusts, 0.5),
        obs_count: samples.len(),
        coverage,
    }
}

// ---------------------------------------------------------------------------
// Sun exposure
// ---------------------------------------------------------------------------

/// Direct-sun exposure over one window of a deployment's observations.
#[derive(Debug, Clone, PartialEq)]
pub struct SunMetrics {
    /// Sum of direct-sun butterfly counts from daytime observations in the
    /// window.
    pub sum_butterflies_direct_sun: f64,
    pub coverage: f64,
}

/// Aggregate direct-sun counts from daytime observations in `[start, end]`.
/// `observations` must already be filtered to the deployment of interest.
///
/// Expected observations assume half of any window is daylight at the
/// camera's 30-minute cadence, which works out to one per window hour.
pub fn sun_window(
    observations: &[Observation],
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> SunMetrics {
    let hours = window_hours(start, end);
    if hours <= 0.0 {
        return SunMetrics {
            sum_butterflies_direct_sun: 0.0,
            coverage: 0.0,
        };
    }

    let in_window: Vec<&Observation> = observations
        .iter()
        .filter(|o| !o.is_night && start <= o.timestamp && o.timestamp <= end)
        .collect();

    let expected = hours * (12.0 / 24.0) * 2.0;
    let coverage = (in_window.len() as f64 / expected).min(1.0);

    SunMetrics {
        sum_butterflies_direct_sun: in_window.iter().map(|o| o.butterflies_direct_sun).sum(),
        coverage,
    }
}

// ---------------------------------------------------------------------------
// Completeness
// ---------------------------------------------------------------------------

/// Geometric mean of the three component coverages. Zero coverage in any
/// component zeroes the whole score.
pub fn metrics_complete(temp: f64, wind: f64, sun: f64) -> f64 {
    (temp * wind * sun).powf(1.0 / 3.0)
}

fn window_hours(start: NaiveDateTime, end: NaiveDateTime) -> f64 {
    (end - start).num_seconds() as f64 / 3600.0
}
