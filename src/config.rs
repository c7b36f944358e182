//! Runtime configuration read from environment variables
//!
//! Every setting has a default except the API key and the cron secret.
//! Without an API key all remote fetches fail fast and callers get the
//! fallback cards; without a cron secret the cron endpoints reject every
//! request.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration as StdDuration;

use chrono::Duration;
use directories::ProjectDirs;
use thiserror::Error;
use tracing::{info, warn};

use crate::data::source::{DEFAULT_API_BASE_URL, DEFAULT_API_HOST};
use crate::sync::SyncConfig;

/// Errors raised while loading configuration
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// A variable is set but cannot be parsed
    #[error("Invalid value for {key}: '{value}'")]
    Invalid { key: String, value: String },
}

/// Settings for the server and the maintenance commands
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub api_base_url: String,
    pub api_key: Option<String>,
    pub api_host: String,
    /// Bearer secret guarding the cron endpoints
    pub cron_secret: Option<String>,
    pub cache_dir: PathBuf,
    /// Freshness window of the card-set cache
    pub cache_duration: Duration,
    /// Age at which the scheduled refresh replaces the card-set cache
    pub refresh_threshold: Duration,
    /// Freshness window of the per-card detail cache
    pub detail_cache_duration: Duration,
    pub sync: SyncConfig,
}

impl Config {
    /// Loads configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads configuration through `lookup`, which maps a variable name to its value
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let cache_dir = match lookup("CARDWISE_CACHE_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => default_cache_dir(),
        };

        let config = Self {
            port: try_load(&lookup, "CARDWISE_PORT", 3000)?,
            api_base_url: lookup("CARD_API_BASE_URL").unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            api_key: secret("CARD_API_KEY"),
            api_host: lookup("CARD_API_HOST").unwrap_or_else(|| DEFAULT_API_HOST.to_string()),
            cron_secret: secret("CRON_SECRET"),
            cache_dir,
            cache_duration: load_duration(&lookup, "CACHE_DURATION_HOURS", 24, Duration::try_hours)?,
            refresh_threshold: load_duration(&lookup, "REFRESH_THRESHOLD_HOURS", 12, Duration::try_hours)?,
            detail_cache_duration: load_duration(&lookup, "DETAIL_CACHE_DAYS", 7, Duration::try_days)?,
            sync: SyncConfig {
                batch_size: try_load(&lookup, "SYNC_BATCH_SIZE", 10)?,
                max_batches: try_load(&lookup, "SYNC_MAX_BATCHES", 5)?,
                batch_delay: StdDuration::from_millis(try_load(&lookup, "SYNC_BATCH_DELAY_MS", 1000)?),
            },
        };

        if config.api_key.is_none() {
            info!("CARD_API_KEY not set, card requests will use fallback data");
        }
        Ok(config)
    }
}

/// XDG cache directory, or `./.cache` when no home directory is available
fn default_cache_dir() -> PathBuf {
    ProjectDirs::from("", "", "cardwise")
        .map(|dirs| dirs.cache_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".cache"))
}

fn try_load<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + std::fmt::Display,
{
    match lookup(key) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            key: key.to_string(),
            value,
        }),
        None => {
            warn!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}

/// Loads a non-negative count of `unit`s, rejecting values chrono cannot represent
fn load_duration<F>(
    lookup: &F,
    key: &str,
    default: i64,
    unit: fn(i64) -> Option<Duration>,
) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let count: i64 = try_load(lookup, key, default)?;
    Some(count)
        .filter(|count| *count >= 0)
        .and_then(unit)
        .ok_or_else(|| ConfigError::Invalid {
            key: key.to_string(),
            value: count.to_string(),
        })
}
