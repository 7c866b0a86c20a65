//! Stage-tagged logging for the preparation pipeline.
//!
//! Every diagnostic goes to standard output as a human-readable line,
//! optionally tagged with the deployment it concerns, and optionally mirrored
//! to a log file for unattended batch runs. There is no structured or
//! machine-readable channel; re-running the job is the recovery path, so the
//! log only needs to tell a person what happened.

use chrono::Local;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline stages
// ---------------------------------------------------------------------------

/// Which part of the pipeline a message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Counts,
    Temperature,
    Wind,
    Daily,
    Lag,
    Metadata,
    System,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Counts => write!(f, "COUNTS"),
            Stage::Temperature => write!(f, "TEMP"),
            Stage::Wind => write!(f, "WIND"),
            Stage::Daily => write!(f, "DAILY"),
            Stage::Lag => write!(f, "LAG"),
            Stage::Metadata => write!(f, "META"),
            Stage::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger
// ---------------------------------------------------------------------------

/// Global logger instance. Uninitialized logging falls back to plain
/// println so library use in tests never loses diagnostics.
static LOGGER: Mutex<Option<Logger>> = Mutex::new(None);

pub struct Logger {
    min_level: LogLevel,
    log_file: Option<String>,
}

impl Logger {
    /// Initialize the global logger.
    pub fn init(min_level: LogLevel, log_file: Option<String>) {
        *LOGGER.lock().unwrap() = Some(Logger { min_level, log_file });
    }

    fn log(&self, level: LogLevel, stage: Stage, deployment: Option<&str>, message: &str) {
        if level < self.min_level {
            return;
        }

        let site_part = deployment.map(|d| format!(" [{}]", d)).unwrap_or_default();
        match level {
            LogLevel::Warning => println!("⚠️  {}{}: {}", stage, site_part, message),
            LogLevel::Error => println!("❌ {}{}: {}", stage, site_part, message),
            _ => println!("{}", message),
        }

        if let Some(ref path) = self.log_file {
            let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
            let entry = format!("{} {} {}{}: {}", timestamp, level, stage, site_part, message);
            if let Err(e) = Self::append_to_file(path, &entry) {
                eprintln!("Failed to write to log file {}: {}", path, e);
            }
        }
    }

    fn append_to_file(path: &str, entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Public logging functions
// ---------------------------------------------------------------------------

/// Initialize the global logger.
pub fn init_logger(min_level: LogLevel, log_file: Option<&str>) {
    Logger::init(min_level, log_file.map(String::from));
}

fn dispatch(level: LogLevel, stage: Stage, deployment: Option<&str>, message: &str) {
    if let Some(logger) = LOGGER.lock().unwrap().as_ref() {
        logger.log(level, stage, deployment, message);
    } else {
        match level {
            LogLevel::Warning => println!("⚠️  {}: {}", stage, message),
            LogLevel::Error => println!("❌ {}: {}", stage, message),
            _ => println!("{}", message),
        }
    }
}

/// Log a progress/informational message.
pub fn info(stage: Stage, deployment: Option<&str>, message: &str) {
    dispatch(LogLevel::Info, stage, deployment, message);
}

/// Log a warning. Warnings mark skipped units of work (a pair, a day, a
/// deployment's wind data), never a failed run.
pub fn warn(stage: Stage, deployment: Option<&str>, message: &str) {
    dispatch(LogLevel::Warning, stage, deployment, message);
}

/// Log an error that is about to abort the run.
pub fn error(stage: Stage, deployment: Option<&str>, message: &str) {
    dispatch(LogLevel::Error, stage, deployment, message);
}

/// Log per-observation detail; hidden unless verbose mode is on.
pub fn debug(stage: Stage, deployment: Option<&str>, message: &str) {
    dispatch(LogLevel::Debug, stage, deployment, message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warning);
        assert!(LogLevel::Warning < LogLevel::Error);
    }

    #[test]
    fn test_stage_tags_are_short_and_distinct() {
        let tags = [
            Stage::Counts.to_string(),
            Stage::Temperature.to_string(),
            Stage::Wind.to_string(),
            Stage::Daily.to_string(),
            Stage::Lag.to_string(),
            Stage::Metadata.to_string(),
            Stage::System.to_string(),
        ];
        let mut seen = std::collections::HashSet::new();
        for tag in &tags {
            assert!(seen.insert(tag.clone()), "duplicate stage tag '{}'", tag);
            assert!(tag.len() <= 6);
        }
    }
}
