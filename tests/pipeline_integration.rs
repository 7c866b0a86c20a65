//! End-to-end pipeline run over a synthetic two-day deployment.
//!
//! Builds a full input tree in a temp directory — classification JSON,
//! temperature CSV, deployment metadata and a wind SQLite store — runs the
//! pipeline for both window modes, and checks the output tables row by row.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use monarch_dataprep::config::Config;
use monarch_dataprep::{RunOptions, run};

fn write_inputs(root: &Path) -> (PathBuf, PathBuf, PathBuf, PathBuf) {
    let json_dir = root.join("json");
    std::fs::create_dir(&json_dir).unwrap();

    // Two observed days plus one night image that must stay out of the
    // daytime aggregates. Day 1 peaks at 10 butterflies at 14:00; day 2
    // peaks at 50 at 14:00 and ends at 15:30.
    let classifications = serde_json::json!({
        "SC3_20231117100000.jpg": {
            "isNight": false,
            "cells": { "A1": { "count": "1-9", "directSun": true } }
        },
        "SC3_20231117140000.jpg": {
            "isNight": false,
            "cells": { "A1": { "count": "10-99", "directSun": false } }
        },
        "SC3_20231117160000.jpg": {
            "isNight": false,
            "cells": { "A1": { "count": "0", "directSun": false } }
        },
        "SC3_20231117230000.jpg": {
            "isNight": true,
            "cells": { "A1": { "count": "1000+", "directSun": false } }
        },
        "SC3_20231118100000.jpg": {
            "isNight": false,
            "cells": { "A1": { "count": 5, "directSun": true } }
        },
        "SC3_20231118140000.jpg": {
            "isNight": false,
            "cells": { "A1": { "count": 50, "directSun": false } }
        },
        "SC3_20231118153000.jpg": {
            "isNight": false,
            "cells": { "A1": { "count": 2, "directSun": false } }
        }
    });
    std::fs::write(
        json_dir.join("SC3.json"),
        serde_json::to_string_pretty(&classifications).unwrap(),
    )
    .unwrap();

    // 24/7 temperature log: per-image readings plus an overnight reading
    // that only the lag window can see.
    let temp_file = root.join("temperature.csv");
    std::fs::write(
        &temp_file,
        "filename,temperature\n\
         SC3_20231117100000.jpg,14.0\n\
         SC3_20231117140000.jpg,18.0\n\
         SC3_20231117160000.jpg,16.0\n\
         SC3_20231118020000.jpg,10.0\n\
         SC3_20231118100000.jpg,15.0\n\
         SC3_20231118140000.jpg,20.0\n\
         SC3_20231118153000.jpg,19.0\n",
    )
    .unwrap();

    let deployments_file = root.join("deployments.csv");
    std::fs::write(
        &deployments_file,
        "deployment_id,wind_meter_name,Observer,horizontal_dist_to_cluster_m,grove,view_id\n\
         SC3,WM1,R. Alvarez,12.5,Pismo,V2\n",
    )
    .unwrap();

    let wind_dir = root.join("wind");
    std::fs::create_dir(&wind_dir).unwrap();
    let conn = rusqlite::Connection::open(wind_dir.join("WM1.s3db")).unwrap();
    conn.execute("CREATE TABLE Wind (time TEXT, speed TEXT, gust TEXT)", [])
        .unwrap();
    for (time, speed, gust) in [
        // Inside the lag window (17th 14:00 → 18th 14:00/15:30).
        ("2023-11-17 15:00:00", "1.0", "2.5"),
        ("2023-11-18 03:00:00", "0.5", "1.0"),
        ("2023-11-18 10:30:00", " 1.2 ", "1.5"),
        // Before the window; also outside the 18th's 06:00-18:00 daily span.
        ("2023-11-17 05:00:00", "3.0", "9.0"),
    ] {
        conn.execute(
            "INSERT INTO Wind (time, speed, gust) VALUES (?1, ?2, ?3)",
            [time, speed, gust],
        )
        .unwrap();
    }
    drop(conn);

    (json_dir, temp_file, deployments_file, wind_dir)
}

fn read_rows(path: &Path) -> Vec<HashMap<String, String>> {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
    reader
        .records()
        .map(|r| {
            headers
                .iter()
                .cloned()
                .zip(r.unwrap().iter().map(String::from))
                .collect()
        })
        .collect()
}

#[test]
fn test_full_pipeline_produces_daily_and_lag_tables() {
    let dir = tempfile::tempdir().unwrap();
    let (json_dir, temp_file, deployments_file, wind_dir) = write_inputs(dir.path());

    let output_daily = dir.path().join("daily.csv");
    let output_24hr = dir.path().join("lag_24hr.csv");
    let output_sunset = dir.path().join("lag_sunset.csv");

    // The synthetic days hold 3 photos each, so relax the valid-day band.
    let mut config = Config::default();
    config.min_photos_per_day = 1;
    config.max_photos_per_day = 100;

    let options = RunOptions {
        json_dir,
        temp_file,
        wind_db_dir: Some(wind_dir),
        deployments_file: Some(deployments_file),
        output_daily: Some(output_daily.clone()),
        output_24hr: Some(output_24hr.clone()),
        output_sunset: Some(output_sunset.clone()),
        config,
    };
    run(&options).expect("pipeline run should succeed");

    // --- Daily table -------------------------------------------------------
    let daily = read_rows(&output_daily);
    assert_eq!(daily.len(), 2, "two observed days, night image excluded");

    let day1 = &daily[0];
    assert_eq!(day1["deployment_id"], "SC3");
    assert_eq!(day1["date"], "2023-11-17");
    assert_eq!(day1["photo_count"], "3");
    assert_eq!(day1["max_butterflies"], "10");
    assert_eq!(day1["time_of_max"], "2023-11-17 14:00:00");
    assert_eq!(day1["day_sequence"], "1");
    // Daily wind covers 06:00-18:00 of the 17th: the 05:00 gust of 9.0 is
    // outside it, so only the 15:00 reading counts.
    assert_eq!(day1["wind_max_gust"], "2.5");

    let day2 = &daily[1];
    assert_eq!(day2["date"], "2023-11-18");
    assert_eq!(day2["max_butterflies"], "50");
    assert_eq!(day2["last_observation_time"], "2023-11-18 15:30:00");
    assert_eq!(day2["day_sequence"], "2");
    // 2023-10-15 → 2023-11-18 is 34 days.
    assert_eq!(day2["days_since_season_start"], "34");

    // --- 24-hour lag table ---------------------------------------------------
    let lag = read_rows(&output_24hr);
    assert_eq!(lag.len(), 1);
    let pair = &lag[0];

    // Window anchored at day 1's time of max, ending exactly 24 h later.
    assert_eq!(pair["window_start"], "2023-11-17 14:00:00");
    assert_eq!(pair["window_end"], "2023-11-18 14:00:00");
    assert_eq!(pair["lag_duration_hours"], "24");

    assert_eq!(pair["max_butterflies_t"], "50");
    assert_eq!(pair["max_butterflies_t_1"], "10");
    assert_eq!(pair["butterfly_diff"], "40");

    // Temperature over the window: readings at 14:00 (18), 16:00 (16),
    // 02:00 (10), 10:00 (15), 14:00 (20).
    assert_eq!(pair["temp_max"], "20");
    assert_eq!(pair["temp_min"], "10");
    assert_eq!(pair["temp_at_max_count_t_1"], "18");

    // Wind over the window: gusts 2.5, 1.0, 1.5 (whitespace speed parsed).
    assert_eq!(pair["wind_max_gust"], "2.5");
    assert_eq!(pair["wind_gust_sum"], "5");
    assert_eq!(pair["wind_minutes_above_2ms"], "1");

    // Metadata joined from the deployments file.
    assert_eq!(pair["observer"], "R. Alvarez");
    assert_eq!(pair["horizontal_dist_to_cluster_m"], "12.5");
    assert_eq!(pair["grove"], "Pismo");
    assert_eq!(pair["view_id"], "V2");

    assert!(pair["metrics_complete"].parse::<f64>().unwrap() > 0.0);

    // --- Sunset lag table ------------------------------------------------------
    let sunset = read_rows(&output_sunset);
    assert_eq!(sunset.len(), 1);
    let pair = &sunset[0];
    assert_eq!(pair["window_start"], "2023-11-17 14:00:00");
    assert_eq!(
        pair["window_end"], "2023-11-18 15:30:00",
        "sunset window ends at day t's last observation"
    );
    assert_eq!(pair["lag_duration_hours"], "25.5");
}

#[test]
fn test_empty_json_directory_fails_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let json_dir = dir.path().join("json");
    std::fs::create_dir(&json_dir).unwrap();
    let temp_file = dir.path().join("temperature.csv");
    std::fs::write(&temp_file, "filename,temperature\n").unwrap();

    let options = RunOptions {
        json_dir,
        temp_file,
        wind_db_dir: None,
        deployments_file: None,
        output_daily: None,
        output_24hr: Some(dir.path().join("lag.csv")),
        output_sunset: None,
        config: Config::default(),
    };
    let err = run(&options).expect_err("no input JSON must abort the run");
    assert!(err.to_string().contains("No usable data"));
}
