//! Day-over-day lag pair construction.
//!
//! For each deployment, consecutive valid days become (t−1, t) pairs with
//! weather aggregated over a window anchored at the previous day's time of
//! max count. Non-consecutive dates break the chain (a pair spanning a gap
//! would compare across unobserved days), and pairs where both days saw zero
//! butterflies are suppressed since a 0 → 0 "change" carries no signal for
//! the response variables.

use chrono::{Duration, NaiveDate};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use crate::analysis::{stats, windows};
use crate::deployments::DeploymentTable;
use crate::ingest::wind;
use crate::logging::{self, Stage};
use crate::model::{
    DailyAggregate, LagPair, Observation, PipelineError, TempReading, WindStats, WindowMode,
};

/// Build the lag-pair table for one window mode.
///
/// `valid_days` are the photo-count-filtered daily aggregates;
/// `observations` and `temp_series` are the full (unfiltered) per-image and
/// 24/7 series the window queries run over. Returns rows ordered by
/// (deployment_id, date_t). An empty result is an error: a lag dataset with
/// no rows means the inputs cannot support the analysis at all.
pub fn build_lag_pairs(
    valid_days: &[DailyAggregate],
    observations: &[Observation],
    temp_series: &[TempReading],
    wind_stores: &HashMap<String, PathBuf>,
    metadata: &DeploymentTable,
    mode: WindowMode,
) -> Result<Vec<LagPair>, PipelineError> {
    let mut days_by_deployment: BTreeMap<&str, Vec<&DailyAggregate>> = BTreeMap::new();
    for day in valid_days {
        days_by_deployment
            .entry(&day.deployment_id)
            .or_default()
            .push(day);
    }

    let mut obs_by_deployment: HashMap<&str, Vec<&Observation>> = HashMap::new();
    for obs in observations {
        obs_by_deployment
            .entry(&obs.deployment_id)
            .or_default()
            .push(obs);
    }
    let mut temps_by_deployment: HashMap<&str, Vec<&TempReading>> = HashMap::new();
    for reading in temp_series {
        temps_by_deployment
            .entry(&reading.deployment_id)
            .or_default()
            .push(reading);
    }

    let mut pairs = Vec::new();
    let mut suppressed_zero_pairs = 0usize;

    for (deployment_id, mut days) in days_by_deployment {
        days.sort_by_key(|d| d.date);

        if days.len() < 2 {
            logging::warn(
                Stage::Lag,
                Some(deployment_id),
                &format!("Only {} valid day(s); no pairs possible", days.len()),
            );
            continue;
        }

        let deployment_obs: Vec<Observation> = obs_by_deployment
            .get(deployment_id)
            .map(|v| v.iter().map(|&o| o.clone()).collect())
            .unwrap_or_default();
        let deployment_temps: Vec<TempReading> = temps_by_deployment
            .get(deployment_id)
            .map(|v| v.iter().map(|&r| r.clone()).collect())
            .unwrap_or_default();
        let store = wind_stores.get(deployment_id);

        let mut built = 0usize;
        for i in 1..days.len() {
            let prev = days[i - 1];
            let curr = days[i];

            if curr.date - prev.date != Duration::days(1) {
                logging::warn(
                    Stage::Lag,
                    Some(deployment_id),
                    &format!(
                        "Gap between {} and {}; pair skipped",
                        prev.date, curr.date
                    ),
                );
                continue;
            }
            if prev.max_butterflies == 0.0 && curr.max_butterflies == 0.0 {
                suppressed_zero_pairs += 1;
                continue;
            }

            let window_start = prev.time_of_max;
            let window_end = match mode {
                WindowMode::Fixed24h => window_start + Duration::hours(24),
                WindowMode::Sunset => curr.last_observation_time,
            };
            let lag_duration_hours =
                (window_end - window_start).num_seconds() as f64 / 3600.0;

            let temp = windows::temperature_window(&deployment_temps, window_start, window_end);
            let sun = windows::sun_window(&deployment_obs, window_start, window_end);
            let wind_stats = match store {
                Some(path) => match wind::query_window(path, window_start, window_end) {
                    Ok(samples) => windows::wind_stats(&samples, lag_duration_hours),
                    Err(e) => {
                        logging::warn(
                            Stage::Wind,
                            Some(deployment_id),
                            &format!("Wind query failed for window at {}: {}", window_start, e),
                        );
                        WindStats::empty()
                    }
                },
                None => WindStats::empty(),
            };

            let diff = curr.max_butterflies - prev.max_butterflies;
            let diff_95th =
                curr.butterflies_95th_percentile - prev.butterflies_95th_percentile;
            let diff_top3 = curr.butterflies_top3_mean - prev.butterflies_top3_mean;

            let meta = metadata.get(deployment_id);

            pairs.push(LagPair {
                deployment_id: deployment_id.to_string(),
                deployment_day_id_t: day_id(deployment_id, curr.date),
                deployment_day_id_t_1: day_id(deployment_id, prev.date),
                date_t: curr.date,
                date_t_1: prev.date,
                observation_order_t: i + 1,
                day_sequence: curr.day_sequence,

                window_start,
                window_end,
                lag_duration_hours,
                metrics_complete: windows::metrics_complete(
                    temp.coverage,
                    wind_stats.coverage,
                    sun.coverage,
                ),
                temp_data_coverage: temp.coverage,
                wind_data_coverage: wind_stats.coverage,
                butterfly_data_coverage: sun.coverage,

                max_butterflies_t: curr.max_butterflies,
                butterflies_95th_percentile_t: curr.butterflies_95th_percentile,
                butterflies_top3_mean_t: curr.butterflies_top3_mean,
                sum_butterflies_direct_sun_t: curr.sum_butterflies_direct_sun,
                time_of_max_t: curr.time_of_max,

                max_butterflies_t_1: prev.max_butterflies,
                butterflies_95th_percentile_t_1: prev.butterflies_95th_percentile,
                butterflies_top3_mean_t_1: prev.butterflies_top3_mean,
                time_of_max_t_1: prev.time_of_max,

                temp_max: temp.temp_max,
                temp_min: temp.temp_min,
                temp_mean: temp.temp_mean,
                temp_at_max_count_t_1: prev.temp_at_max,
                hours_above_15c: temp.hours_above_15c,
                degree_hours_above_15c: temp.degree_hours_above_15c,

                wind_avg_sustained: wind_stats.avg_sustained,
                wind_max_gust: wind_stats.max_gust,
                wind_gust_sum: wind_stats.gust_sum,
                wind_gust_sum_above_2ms: wind_stats.gust_sum_above_2ms,
                wind_gust_hours: wind_stats.gust_hours,
                wind_minutes_above_2ms: wind_stats.minutes_above_2ms,
                wind_gust_sd: wind_stats.gust_sd,
                wind_mode_gust: wind_stats.mode_gust,

                sum_butterflies_direct_sun: sun.sum_butterflies_direct_sun,

                days_since_season_start_t: curr.days_since_season_start,

                butterfly_diff: diff,
                butterfly_diff_cbrt: stats::signed_cbrt(diff),
                butterfly_diff_log: stats::signed_log1p(diff),
                butterfly_diff_95th: diff_95th,
                butterfly_diff_95th_cbrt: stats::signed_cbrt(diff_95th),
                butterfly_diff_95th_log: stats::signed_log1p(diff_95th),
                butterfly_diff_top3: diff_top3,
                butterfly_diff_top3_cbrt: stats::signed_cbrt(diff_top3),
                butterfly_diff_top3_log: stats::signed_log1p(diff_top3),

                observer: meta.and_then(|m| m.observer.clone()),
                horizontal_dist_to_cluster_m: meta
                    .and_then(|m| m.horizontal_dist_to_cluster_m),
                grove: meta.and_then(|m| m.grove.clone()),
                view_id: meta.and_then(|m| m.view_id.clone()),
            });
            built += 1;
        }

        logging::info(
            Stage::Lag,
            Some(deployment_id),
            &format!("Built {} {} lag pairs", built, mode.label()),
        );
    }

    if suppressed_zero_pairs > 0 {
        logging::info(
            Stage::Lag,
            None,
            &format!(
                "Suppressed {} zero-to-zero pairs",
                suppressed_zero_pairs
            ),
        );
    }

    if pairs.is_empty() {
        return Err(PipelineError::EmptyOutput(format!(
            "no {} lag pairs could be built",
            mode.label()
        )));
    }

    pairs.sort_by(|a, b| {
        (a.deployment_id.as_str(), a.date_t).cmp(&(b.deployment_id.as_str(), b.date_t))
    });
    logging::info(
        Stage::Lag,
        None,
        &format!("{} lag pairs total ({} window)", pairs.len(), mode.label()),
    );
    Ok(pairs)
}

// Compact YYYYMMDD ids so rows join against earlier seasons' outputs.
fn day_id(deployment_id: &str, date: NaiveDate) -> String {
    format!("{}_{}", deployment_id, date.format("%Y%m%d"))
}
