//! Pipeline configuration.
//!
//! Night periods, downsampling rules, the valid-day photo-count bounds and
//! the season start date were all hardcoded constants in earlier versions of
//! the analysis. They are empirical, per-field-season values, so they live in
//! a TOML file that can be swapped without recompiling. `Config::default()`
//! reproduces the 2023 field-season values so the pipeline also runs with no
//! config file at all.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::model::PipelineError;

/// One explicit night interval, as inclusive 14-digit timestamp strings
/// (`YYYYMMDDHHMMSS`). String comparison on this format is chronological,
/// so membership is a lexicographic range check.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct NightPeriod {
    pub start: String,
    pub end: String,
}

/// Downsampling rule for deployments that recorded finer than the target
/// analysis cadence. Observations are kept only when their minute-of-hour is
/// an exact multiple of `target_interval_min`.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
pub struct DownsampleRule {
    /// Native recording cadence of the camera, in minutes. Informational.
    pub original_interval_min: u32,
    /// Common cadence every deployment is reduced to, in minutes.
    pub target_interval_min: u32,
}

/// Full pipeline configuration. Every field has a default, so a partial TOML
/// file overrides only what it names.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Minimum daytime photos for a day to enter the lag analysis.
    pub min_photos_per_day: usize,
    /// Maximum daytime photos for a day to enter the lag analysis.
    pub max_photos_per_day: usize,
    /// Reference date for the `days_since_season_start` covariate.
    /// Written as a quoted string, e.g. `season_start = "2023-10-15"`.
    pub season_start: NaiveDate,
    /// Explicit per-deployment night intervals, ORed with the `isNight`
    /// flag carried by the classification records.
    pub night_periods: HashMap<String, Vec<NightPeriod>>,
    /// Per-deployment downsampling rules.
    pub downsample_rules: HashMap<String, DownsampleRule>,
}

impl Default for Config {
    fn default() -> Self {
        let mut night_periods = HashMap::new();
        night_periods.insert(
            "SC1".to_string(),
            vec![
                night("20231117174001", "20231118062001"),
                night("20231118172501", "20231119061501"),
                night("20231119171001", "20231120062001"),
                night("20231120172001", "20231121063001"),
            ],
        );
        night_periods.insert(
            "SC2".to_string(),
            vec![
                night("20231117172501", "20231118062001"),
                night("20231118171501", "20231119061501"),
            ],
        );

        let mut downsample_rules = HashMap::new();
        for id in ["SC1", "SC2"] {
            downsample_rules.insert(id.to_string(), rule(5, 30));
        }
        for id in ["SC7", "SC9", "SC12", "SLC6_2"] {
            downsample_rules.insert(id.to_string(), rule(10, 30));
        }

        Config {
            min_photos_per_day: 15,
            max_photos_per_day: 25,
            season_start: NaiveDate::from_ymd_opt(2023, 10, 15)
                .expect("static date is valid"),
            night_periods,
            downsample_rules,
        }
    }
}

fn night(start: &str, end: &str) -> NightPeriod {
    NightPeriod {
        start: start.to_string(),
        end: end.to_string(),
    }
}

fn rule(original: u32, target: u32) -> DownsampleRule {
    DownsampleRule {
        original_interval_min: original,
        target_interval_min: target,
    }
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults for
    /// any field the file omits.
    pub fn load(path: &Path) -> Result<Config, PipelineError> {
        let text = std::fs::read_to_string(path).map_err(|e| PipelineError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        toml::from_str(&text).map_err(|e| PipelineError::Malformed {
            path: path.display().to_string(),
            detail: e.to_string(),
        })
    }

    /// True when `timestamp` falls inside one of the deployment's configured
    /// night intervals (inclusive on both ends).
    pub fn is_night(&self, deployment_id: &str, timestamp: NaiveDateTime) -> bool {
        let Some(periods) = self.night_periods.get(deployment_id) else {
            return false;
        };
        let stamp = timestamp.format("%Y%m%d%H%M%S").to_string();
        periods
            .iter()
            .any(|p| p.start.as_str() <= stamp.as_str() && stamp.as_str() <= p.end.as_str())
    }

    /// True when the observation should be dropped by the deployment's
    /// downsampling rule. Deployments without a rule keep everything.
    pub fn should_downsample(&self, deployment_id: &str, timestamp: NaiveDateTime) -> bool {
        use chrono::Timelike;
        let Some(rule) = self.downsample_rules.get(deployment_id) else {
            return false;
        };
        timestamp.minute() % rule.target_interval_min != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y%m%d%H%M%S").unwrap()
    }

    #[test]
    fn test_default_config_matches_field_season_values() {
        let config = Config::default();
        assert_eq!(config.min_photos_per_day, 15);
        assert_eq!(config.max_photos_per_day, 25);
        assert_eq!(config.night_periods["SC1"].len(), 4);
        assert_eq!(config.night_periods["SC2"].len(), 2);
        assert_eq!(config.downsample_rules["SC1"].target_interval_min, 30);
        assert_eq!(config.downsample_rules["SC7"].original_interval_min, 10);
        assert!(config.downsample_rules.contains_key("SLC6_2"));
    }

    #[test]
    fn test_night_check_is_inclusive_on_both_ends() {
        let config = Config::default();
        assert!(config.is_night("SC1", ts("20231117174001")), "start boundary");
        assert!(config.is_night("SC1", ts("20231118062001")), "end boundary");
        assert!(config.is_night("SC1", ts("20231117230000")), "interior");
        assert!(!config.is_night("SC1", ts("20231117174000")), "just before");
        assert!(!config.is_night("SC1", ts("20231118062002")), "just after");
    }

    #[test]
    fn test_unknown_deployment_is_never_night() {
        let config = Config::default();
        assert!(!config.is_night("SC99", ts("20231117230000")));
    }

    #[test]
    fn test_downsample_keeps_only_target_interval_boundaries() {
        let config = Config::default();
        // SC1 downsamples 5-min data to 30-min boundaries.
        assert!(!config.should_downsample("SC1", ts("20231117120000")));
        assert!(!config.should_downsample("SC1", ts("20231117123000")));
        assert!(config.should_downsample("SC1", ts("20231117120500")));
        assert!(config.should_downsample("SC1", ts("20231117122500")));
        // Deployments without a rule keep everything.
        assert!(!config.should_downsample("SC3", ts("20231117120500")));
    }

    #[test]
    fn test_partial_toml_overrides_only_named_fields() {
        let text = r#"
            min_photos_per_day = 10

            [night_periods]
            SC5 = [{ start = "20231201000000", end = "20231201060000" }]
        "#;
        let config: Config = toml::from_str(text).unwrap();
        assert_eq!(config.min_photos_per_day, 10);
        assert_eq!(config.max_photos_per_day, 25, "unnamed field keeps default");
        assert!(config.night_periods.contains_key("SC5"));
        assert!(
            !config.night_periods.contains_key("SC1"),
            "night table is replaced wholesale, not merged"
        );
    }

    #[test]
    fn test_season_start_parses_from_quoted_string() {
        let config: Config = toml::from_str(r#"season_start = "2024-11-01""#).unwrap();
        assert_eq!(config.season_start, NaiveDate::from_ymd_opt(2024, 11, 1).unwrap());
    }
}
