//! CSV output for the daily aggregate and lag-pair tables.
//!
//! Column order is part of the contract with the downstream modelling
//! scripts; missing values are written as empty fields, datetimes as
//! `%Y-%m-%d %H:%M:%S` and dates as `%Y-%m-%d`.

use chrono::{NaiveDate, NaiveDateTime};
use std::path::Path;

use crate::logging::{self, Stage};
use crate::model::{DailyAggregate, LagPair, PipelineError};

const DAILY_HEADER: [&str; 27] = [
    "deployment_id",
    "date",
    "photo_count",
    "max_butterflies",
    "butterflies_95th_percentile",
    "butterflies_top3_mean",
    "sum_butterflies_direct_sun",
    "time_of_max",
    "temp_at_max",
    "last_observation_time",
    "temp_max",
    "temp_min",
    "temp_mean",
    "hours_above_15c",
    "degree_hours_above_15c",
    "days_since_season_start",
    "day_sequence",
    "wind_avg_sustained",
    "wind_max_gust",
    "wind_gust_sum",
    "wind_gust_sum_above_2ms",
    "wind_gust_hours",
    "wind_minutes_above_2ms",
    "wind_gust_sd",
    "wind_mode_gust",
    "wind_obs_count",
    "wind_coverage",
];

const LAG_HEADER: [&str; 49] = [
    "deployment_id",
    "deployment_day_id_t",
    "deployment_day_id_t_1",
    "date_t",
    "date_t_1",
    "observation_order_t",
    "day_sequence",
    "window_start",
    "window_end",
    "lag_duration_hours",
    "metrics_complete",
    "temp_data_coverage",
    "wind_data_coverage",
    "butterfly_data_coverage",
    "max_butterflies_t",
    "butterflies_95th_percentile_t",
    "butterflies_top3_mean_t",
    "sum_butterflies_direct_sun_t",
    "time_of_max_t",
    "max_butterflies_t_1",
    "butterflies_95th_percentile_t_1",
    "butterflies_top3_mean_t_1",
    "time_of_max_t_1",
    "temp_max",
    "temp_min",
    "temp_mean",
    "temp_at_max_count_t_1",
    "hours_above_15c",
    "degree_hours_above_15c",
    "wind_avg_sustained",
    "wind_max_gust",
    "wind_gust_sum",
    "wind_gust_sum_above_2ms",
    "wind_gust_hours",
    "wind_minutes_above_2ms",
    "wind_gust_sd",
    "wind_mode_gust",
    "sum_butterflies_direct_sun",
    "days_since_season_start_t",
    "butterfly_diff",
    "butterfly_diff_cbrt",
    "butterfly_diff_log",
    "butterfly_diff_95th",
    "butterfly_diff_95th_cbrt",
    "butterfly_diff_95th_log",
    "butterfly_diff_top3",
    "butterfly_diff_top3_cbrt",
    "butterfly_diff_top3_log",
    "observer",
];

// The three trailing metadata columns after `observer`.
const LAG_METADATA_TAIL: [&str; 3] = ["horizontal_dist_to_cluster_m", "grove", "view_id"];

fn datetime(t: NaiveDateTime) -> String {
    t.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn date(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

fn opt_num(v: Option<f64>) -> String {
    v.map(|x| x.to_string()).unwrap_or_default()
}

fn io_err(path: &Path, detail: impl ToString) -> PipelineError {
    PipelineError::Io {
        path: path.display().to_string(),
        source: std::io::Error::other(detail.to_string()),
    }
}

/// Write the daily aggregate table.
pub fn write_daily_csv(path: &Path, aggregates: &[DailyAggregate]) -> Result<(), PipelineError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| io_err(path, e))?;
    writer
        .write_record(DAILY_HEADER)
        .map_err(|e| io_err(path, e))?;

    for a in aggregates {
        let w = &a.daily_wind;
        writer
            .write_record([
                a.deployment_id.clone(),
                date(a.date),
                a.photo_count.to_string(),
                a.max_butterflies.to_string(),
                a.butterflies_95th_percentile.to_string(),
                a.butterflies_top3_mean.to_string(),
                a.sum_butterflies_direct_sun.to_string(),
                datetime(a.time_of_max),
                opt_num(a.temp_at_max),
                datetime(a.last_observation_time),
                opt_num(a.temp_max),
                opt_num(a.temp_min),
                opt_num(a.temp_mean),
                a.hours_above_15c.to_string(),
                a.degree_hours_above_15c.to_string(),
                a.days_since_season_start.to_string(),
                a.day_sequence.to_string(),
                opt_num(w.avg_sustained),
                opt_num(w.max_gust),
                opt_num(w.gust_sum),
                opt_num(w.gust_sum_above_2ms),
                opt_num(w.gust_hours),
                w.minutes_above_2ms.to_string(),
                opt_num(w.gust_sd),
                opt_num(w.mode_gust),
                w.obs_count.to_string(),
                w.coverage.to_string(),
            ])
            .map_err(|e| io_err(path, e))?;
    }
    writer.flush().map_err(|e| io_err(path, e))?;

    logging::info(
        Stage::System,
        None,
        &format!("Wrote {} daily rows to {}", aggregates.len(), path.display()),
    );
    Ok(())
}

/// Write one window mode's lag-pair table. Rows are expected pre-sorted by
/// (deployment_id, date_t); the builder guarantees this.
pub fn write_lag_csv(path: &Path, pairs: &[LagPair]) -> Result<(), PipelineError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| io_err(path, e))?;

    let header: Vec<&str> = LAG_HEADER
        .iter()
        .copied()
        .chain(LAG_METADATA_TAIL.iter().copied())
        .collect();
    writer.write_record(&header).map_err(|e| io_err(path, e))?;

    for p in pairs {
        writer
            .write_record([
                p.deployment_id.clone(),
                p.deployment_day_id_t.clone(),
                p.deployment_day_id_t_1.clone(),
                date(p.date_t),
                date(p.date_t_1),
                p.observation_order_t.to_string(),
                p.day_sequence.to_string(),
                datetime(p.window_start),
                datetime(p.window_end),
                p.lag_duration_hours.to_string(),
                p.metrics_complete.to_string(),
                p.temp_data_coverage.to_string(),
                p.wind_data_coverage.to_string(),
                p.butterfly_data_coverage.to_string(),
                p.max_butterflies_t.to_string(),
                p.butterflies_95th_percentile_t.to_string(),
                p.butterflies_top3_mean_t.to_string(),
                p.sum_butterflies_direct_sun_t.to_string(),
                datetime(p.time_of_max_t),
                p.max_butterflies_t_1.to_string(),
                p.butterflies_95th_percentile_t_1.to_string(),
                p.butterflies_top3_mean_t_1.to_string(),
                datetime(p.time_of_max_t_1),
                opt_num(p.temp_max),
                opt_num(p.temp_min),
                opt_num(p.temp_mean),
                opt_num(p.temp_at_max_count_t_1),
                opt_num(p.hours_above_15c),
                opt_num(p.degree_hours_above_15c),
                opt_num(p.wind_avg_sustained),
                opt_num(p.wind_max_gust),
                opt_num(p.wind_gust_sum),
                opt_num(p.wind_gust_sum_above_2ms),
                opt_num(p.wind_gust_hours),
                p.wind_minutes_above_2ms.to_string(),
                opt_num(p.wind_gust_sd),
                opt_num(p.wind_mode_gust),
                p.sum_butterflies_direct_sun.to_string(),
                p.days_since_season_start_t.to_string(),
                p.butterfly_diff.to_string(),
                p.butterfly_diff_cbrt.to_string(),
                p.butterfly_diff_log.to_string(),
                p.butterfly_diff_95th.to_string(),
                p.butterfly_diff_95th_cbrt.to_string(),
                p.butterfly_diff_95th_log.to_string(),
                p.butterfly_diff_top3.to_string(),
                p.butterfly_diff_top3_cbrt.to_string(),
                p.butterfly_diff_top3_log.to_string(),
                p.observer.clone().unwrap_or_default(),
                opt_num(p.horizontal_dist_to_cluster_m),
                p.grove.clone().unwrap_or_default(),
                p.view_id.clone().unwrap_or_default(),
            ])
            .map_err(|e| io_err(path, e))?;
    }
    writer.flush().map_err(|e| io_err(path, e))?;

    logging::info(
        Stage::System,
        None,
        &format!("Wrote {} lag pairs to {}", pairs.len(), path.display()),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::WindStats;

    fn sample_aggregate() -> DailyAggregate {
        let d = NaiveDate::from_ymd_opt(2023, 11, 17).unwrap();
        DailyAggregate {
            deployment_id: "SC3".to_string(),
            date: d,
            photo_count: 20,
            max_butterflies: 42.0,
            butterflies_95th_percentile: 40.0,
            butterflies_top3_mean: 38.0,
            sum_butterflies_direct_sun: 10.0,
            time_of_max: d.and_hms_opt(13, 30, 0).unwrap(),
            temp_at_max: None,
            last_observation_time: d.and_hms_opt(17, 0, 0).unwrap(),
            temp_max: Some(21.5),
            temp_min: Some(9.0),
            temp_mean: Some(15.25),
            hours_above_15c: 3.5,
            degree_hours_above_15c: 6.25,
            days_since_season_start: 33,
            day_sequence: 1,
            daily_wind: WindStats::empty(),
        }
    }

    #[test]
    fn test_daily_csv_has_header_and_blank_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daily.csv");
        write_daily_csv(&path, &[sample_aggregate()]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("deployment_id,date,photo_count"));
        assert_eq!(header.split(',').count(), DAILY_HEADER.len());

        let row = lines.next().unwrap();
        let fields: Vec<&str> = row.split(',').collect();
        assert_eq!(fields[0], "SC3");
        assert_eq!(fields[1], "2023-11-17");
        assert_eq!(fields[7], "2023-11-17 13:30:00");
        assert_eq!(fields[8], "", "missing temp_at_max is an empty field");
        assert_eq!(fields[10], "21.5");
    }

    #[test]
    fn test_lag_header_column_count_matches_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lag.csv");
        write_lag_csv(&path, &[]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let header = text.lines().next().unwrap();
        assert_eq!(
            header.split(',').count(),
            LAG_HEADER.len() + LAG_METADATA_TAIL.len()
        );
        assert!(header.ends_with("observer,horizontal_dist_to_cluster_m,grove,view_id"));
    }
}
