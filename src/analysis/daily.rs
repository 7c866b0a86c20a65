//! Daily aggregation: per-image observations down to one row per
//! (deployment, date).
//!
//! Night observations never contribute here; a date with zero daytime
//! observations simply produces no row. Each surviving day gets a
//! `day_sequence` rank within its deployment and a `days_since_season_start`
//! covariate, then the valid-day filter drops days whose photo count falls
//! outside the configured bounds before the lag builder sees them.

use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use crate::analysis::{stats, windows};
use crate::config::Config;
use crate::ingest::wind;
use crate::logging::{self, Stage};
use crate::model::{DailyAggregate, Observation, PipelineError, WindStats};

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Collapse observations into daily aggregates, in (deployment, date) order.
///
/// `daily_wind` starts out empty; `attach_daily_wind` fills it in for
/// deployments that have a wind store.
pub fn aggregate_daily(
    observations: &[Observation],
    config: &Config,
) -> Result<Vec<DailyAggregate>, PipelineError> {
    let mut groups: BTreeMap<(String, NaiveDate), Vec<&Observation>> = BTreeMap::new();
    for obs in observations.iter().filter(|o| !o.is_night) {
        groups
            .entry((obs.deployment_id.clone(), obs.date))
            .or_default()
            .push(obs);
    }

    if groups.is_empty() {
        return Err(PipelineError::EmptyDataset(
            "no daytime observations to aggregate".to_string(),
        ));
    }

    let mut aggregates = Vec::with_capacity(groups.len());
    let mut sequence_counters: HashMap<String, u32> = HashMap::new();

    for ((deployment_id, date), mut day_obs) in groups {
        day_obs.sort_by_key(|o| o.timestamp);

        let counts: Vec<f64> = day_obs.iter().map(|o| o.total_butterflies).collect();
        let max_butterflies = counts.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        // First observation in time order achieving the max.
        let max_obs = day_obs
            .iter()
            .find(|o| o.total_butterflies == max_butterflies)
            .expect("group is non-empty");

        let temps: Vec<f64> = day_obs.iter().filter_map(|o| o.temperature).collect();
        let hours_above = temps.iter().filter(|&&t| t >= 15.0).count() as f64 * 0.5;
        let degree_hours: f64 = temps
            .iter()
            .filter(|&&t| t > 15.0)
            .map(|&t| (t - 15.0) * 0.5)
            .sum();

        let day_sequence = sequence_counters
            .entry(deployment_id.clone())
            .and_modify(|n| *n += 1)
            .or_insert(1);

        aggregates.push(DailyAggregate {
            deployment_id,
            date,
            photo_count: day_obs.len(),
            max_butterflies,
            butterflies_95th_percentile: stats::percentile(&counts, 95.0)
                .expect("group is non-empty"),
            butterflies_top3_mean: stats::top_k_mean(&counts, 3).expect("group is non-empty"),
            sum_butterflies_direct_sun: day_obs.iter().map(|o| o.butterflies_direct_sun).sum(),
            time_of_max: max_obs.timestamp,
            temp_at_max: max_obs.temperature,
            last_observation_time: day_obs.last().expect("group is non-empty").timestamp,
            temp_max: temps.iter().cloned().reduce(f64::max),
            temp_min: temps.iter().cloned().reduce(f64::min),
            temp_mean: stats::mean(&temps),
            hours_above_15c: hours_above,
            degree_hours_above_15c: degree_hours,
            days_since_season_start: (date - config.season_start).num_days(),
            day_sequence: *day_sequence,
            daily_wind: WindStats::empty(),
        });
    }

    logging::info(
        Stage::Daily,
        None,
        &format!("Aggregated {} deployment-days", aggregates.len()),
    );
    Ok(aggregates)
}

// ---------------------------------------------------------------------------
// Daily wind
// ---------------------------------------------------------------------------

/// Fill each aggregate's `daily_wind` from the deployment's wind store,
/// querying the fixed 06:00–18:00 daytime window of that date. A missing
/// store or a failed query leaves the empty stats in place.
pub fn attach_daily_wind(
    aggregates: &mut [DailyAggregate],
    stores_by_deployment: &HashMap<String, PathBuf>,
) {
    let mut warned: std::collections::HashSet<String> = std::collections::HashSet::new();

    for agg in aggregates.iter_mut() {
        let Some(store) = stores_by_deployment.get(&agg.deployment_id) else {
            if warned.insert(agg.deployment_id.clone()) {
                logging::warn(
                    Stage::Wind,
                    Some(&agg.deployment_id),
                    "No wind store; daily wind metrics will be missing",
                );
            }
            continue;
        };

        let start = agg.date.and_hms_opt(6, 0, 0).expect("valid time");
        let end = agg.date.and_hms_opt(18, 0, 0).expect("valid time");
        match wind::query_window(store, start, end) {
            Ok(samples) => {
                agg.daily_wind = windows::wind_stats(&samples, 12.0);
            }
            Err(e) => {
                logging::warn(
                    Stage::Wind,
                    Some(&agg.deployment_id),
                    &format!("Wind query failed for {}: {}", agg.date, e),
                );
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Valid-day filter
// ---------------------------------------------------------------------------

/// Keep only days whose daytime photo count falls inside the configured
/// bounds (inclusive). Days outside the band either ran partially (camera
/// fault, late deployment) or double-recorded, and would bias the count
/// summaries.
pub fn filter_valid_days(aggregates: Vec<DailyAggregate>, config: &Config) -> Vec<DailyAggregate> {
    let before = aggregates.len();
    let kept: Vec<DailyAggregate> = aggregates
        .into_iter()
        .filter(|a| {
            a.photo_count >= config.min_photos_per_day && a.photo_count <= config.max_photos_per_day
        })
        .collect();

    let excluded = before - kept.len();
    if excluded > 0 {
        logging::info(
            Stage::Daily,
            None,
            &format!(
                "Excluded {} days outside {}-{} photos ({} remain)",
                excluded, config.min_photos_per_day, config.max_photos_per_day, kept.len()
            ),
        );
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn obs(deployment: &str, stamp: &str, count: f64, night: bool) -> Observation {
        let timestamp = NaiveDateTime::parse_from_str(stamp, "%Y%m%d%H%M%S").unwrap();
        Observation {
            deployment_id: deployment.to_string(),
            image_filename: format!("{}_{}.jpg", deployment, stamp),
            timestamp,
            date: timestamp.date(),
            total_butterflies: count,
            butterflies_direct_sun: count / 2.0,
            is_night: night,
            temperature: Some(16.0),
        }
    }

    #[test]
    fn test_day_sequence_ranks_days_within_each_deployment() {
        let observations = vec![
            // SC1: three days.
            obs("SC1", "20231117120000", 1.0, false),
            obs("SC1", "20231118120000", 2.0, false),
            obs("SC1", "20231119120000", 3.0, false),
            // SC2: two days.
            obs("SC2", "20231117120000", 1.0, false),
            obs("SC2", "20231118120000", 2.0, false),
            // SC3: four days.
            obs("SC3", "20231117120000", 1.0, false),
            obs("SC3", "20231118120000", 2.0, false),
            obs("SC3", "20231119120000", 3.0, false),
            obs("SC3", "20231120120000", 4.0, false),
        ];

        let aggregates = aggregate_daily(&observations, &Config::default()).unwrap();
        let seq_of = |id: &str| -> Vec<u32> {
            aggregates
                .iter()
                .filter(|a| a.deployment_id == id)
                .map(|a| a.day_sequence)
                .collect()
        };
        assert_eq!(seq_of("SC1"), vec![1, 2, 3]);
        assert_eq!(seq_of("SC2"), vec![1, 2]);
        assert_eq!(seq_of("SC3"), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_time_of_max_takes_first_tie_in_time_order() {
        let observations = vec![
            obs("SC3", "20231117100000", 5.0, false),
            obs("SC3", "20231117110000", 9.0, false),
            obs("SC3", "20231117140000", 9.0, false),
            obs("SC3", "20231117150000", 3.0, false),
        ];
        let aggregates = aggregate_daily(&observations, &Config::default()).unwrap();
        assert_eq!(aggregates.len(), 1);
        assert_eq!(
            aggregates[0].time_of_max,
            NaiveDateTime::parse_from_str("20231117110000", "%Y%m%d%H%M%S").unwrap()
        );
        assert_eq!(
            aggregates[0].last_observation_time,
            NaiveDateTime::parse_from_str("20231117150000", "%Y%m%d%H%M%S").unwrap()
        );
    }

    #[test]
    fn test_night_observations_never_contribute() {
        let observations = vec![
            obs("SC3", "20231117120000", 5.0, false),
            obs("SC3", "20231117230000", 99.0, true),
            // A date with only night observations yields no aggregate.
            obs("SC3", "20231118230000", 50.0, true),
        ];
        let aggregates = aggregate_daily(&observations, &Config::default()).unwrap();
        assert_eq!(aggregates.len(), 1);
        assert_eq!(aggregates[0].max_butterflies, 5.0);
        assert_eq!(aggregates[0].photo_count, 1);
    }

    #[test]
    fn test_thermal_sums_use_per_image_temperatures() {
        let mut a = obs("SC3", "20231117100000", 1.0, false);
        a.temperature = Some(14.0);
        let mut b = obs("SC3", "20231117103000", 2.0, false);
        b.temperature = Some(17.0);
        let mut c = obs("SC3", "20231117110000", 3.0, false);
        c.temperature = None;

        let aggregates = aggregate_daily(&[a, b, c], &Config::default()).unwrap();
        let agg = &aggregates[0];
        assert_eq!(agg.temp_max, Some(17.0));
        assert_eq!(agg.temp_min, Some(14.0));
        assert_eq!(agg.temp_mean, Some(15.5));
        // One reading >= 15 → 0.5 h; (17-15)*0.5 = 1.0 degree-hours.
        assert_eq!(agg.hours_above_15c, 0.5);
        assert_eq!(agg.degree_hours_above_15c, 1.0);
    }

    #[test]
    fn test_days_since_season_start() {
        let observations = vec![obs("SC3", "20231117120000", 1.0, false)];
        let aggregates = aggregate_daily(&observations, &Config::default()).unwrap();
        // 2023-10-15 → 2023-11-17 is 33 days.
        assert_eq!(aggregates[0].days_since_season_start, 33);
    }

    #[test]
    fn test_all_night_input_is_an_empty_dataset_error() {
        let observations = vec![obs("SC3", "20231117230000", 5.0, true)];
        assert!(aggregate_daily(&observations, &Config::default()).is_err());
    }

    #[test]
    fn test_filter_valid_days_is_inclusive_on_both_bounds() {
        let mut config = Config::default();
        config.min_photos_per_day = 2;
        config.max_photos_per_day = 3;

        let make = |n: usize| {
            let stamps = ["20231117100000", "20231117110000", "20231117120000", "20231117130000"];
            let observations: Vec<Observation> = stamps[..n]
                .iter()
                .map(|s| obs("SC3", s, 1.0, false))
                .collect();
            aggregate_daily(&observations, &config).unwrap().remove(0)
        };

        let days = vec![make(1), make(2), make(3), make(4)];
        let kept = filter_valid_days(days, &config);
        let counts: Vec<usize> = kept.iter().map(|a| a.photo_count).collect();
        assert_eq!(counts, vec![2, 3]);
    }
}
