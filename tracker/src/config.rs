//! Configuration for the puzzle tracker.
//!
//! Handles storage location and aggregator tunables with the following
//! precedence for each value:
//! 1. A dedicated `PUZZLE_TRACKER_*` environment variable
//! 2. A compile-time default

use std::path::PathBuf;
use std::time::Duration;

use crate::aggregator::{AggregatorConfig, DEFAULT_GRACE_PERIOD};

const DEFAULT_CONFIG_DIR: &str = ".config/puzzle-tracker/data";
const DEV_DATA_DIR: &str = "./data";
const DATABASE_FILE_NAME: &str = "puzzles.db";

/// Everything needed to compose a tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    pub database_path: PathBuf,
    pub aggregator: AggregatorConfig,
}

impl TrackerConfig {
    /// Read every tunable from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            database_path: get_database_path(),
            aggregator: AggregatorConfig {
                grace_period: get_feed_grace_period(),
                ..AggregatorConfig::default()
            },
        }
    }

    /// Default tunables with the database at `path`.
    pub fn with_database(path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: path.into(),
            aggregator: AggregatorConfig::default(),
        }
    }
}

/// Get the data directory for persistence.
///
/// Priority:
/// 1. PUZZLE_TRACKER_DATA_DIR env variable if set
/// 2. $HOME/.config/puzzle-tracker/data if HOME is set
/// 3. ./data as fallback
pub fn get_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("PUZZLE_TRACKER_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(DEFAULT_CONFIG_DIR);
    }

    PathBuf::from(DEV_DATA_DIR)
}

/// Get the SQLite database file.
///
/// Priority:
/// 1. PUZZLE_TRACKER_DB_PATH env variable if set
/// 2. `puzzles.db` inside [`get_data_dir`]
pub fn get_database_path() -> PathBuf {
    if let Ok(path) = std::env::var("PUZZLE_TRACKER_DB_PATH") {
        return PathBuf::from(path);
    }

    get_data_dir().join(DATABASE_FILE_NAME)
}

/// Get how long live queries outlive their last subscriber.
///
/// Priority:
/// 1. PUZZLE_TRACKER_FEED_GRACE_MS env variable if set (falls back to the
///    default if the value cannot be parsed as a `u64`)
/// 2. 5 seconds
pub fn get_feed_grace_period() -> Duration {
    parse_grace_period(std::env::var("PUZZLE_TRACKER_FEED_GRACE_MS").ok().as_deref())
}

fn parse_grace_period(raw: Option<&str>) -> Duration {
    raw.and_then(|ms| ms.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_GRACE_PERIOD)
}
