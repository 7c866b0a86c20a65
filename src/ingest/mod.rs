//! Raw input ingest: classification JSON, temperature CSV, wind SQLite.

pub mod counts;
pub mod temperature;
pub mod wind;
