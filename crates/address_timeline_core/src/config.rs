//! Runtime configuration for the timeline core.
//!
//! Values come from `ADDRESS_TIMELINE_*` environment variables; `load()`
//! additionally reads a `.env` file when one is present.

use crate::logging::default_log_level;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_DB_PATH: &str = "ADDRESS_TIMELINE_DB_PATH";
pub const ENV_BUSY_TIMEOUT_MS: &str = "ADDRESS_TIMELINE_BUSY_TIMEOUT_MS";
pub const ENV_LOG_LEVEL: &str = "ADDRESS_TIMELINE_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "ADDRESS_TIMELINE_LOG_DIR";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimelineConfig {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

impl TimelineConfig {
    /// Loads `.env` (if any) and then reads the environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    /// Reads configuration from the process environment only.
    pub fn from_env() -> Result<Self, ConfigError> {
        let path = non_blank_var(ENV_DB_PATH).map(PathBuf::from);
        let busy_timeout = match non_blank_var(ENV_BUSY_TIMEOUT_MS) {
            Some(value) => Duration::from_millis(
                value
                    .parse::<u64>()
                    .map_err(|_| ConfigError::InvalidBusyTimeout(value))?,
            ),
            None => DatabaseConfig::DEFAULT_BUSY_TIMEOUT,
        };

        let level =
            non_blank_var(ENV_LOG_LEVEL).unwrap_or_else(|| default_log_level().to_string());
        let log_dir = non_blank_var(ENV_LOG_DIR).map(PathBuf::from);

        Ok(Self {
            database: DatabaseConfig { path, busy_timeout },
            logging: LoggingConfig { level, log_dir },
        })
    }
}

/// Storage settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// `None` opens an in-memory database.
    pub path: Option<PathBuf>,
    /// How long a writer waits for the database lock.
    pub busy_timeout: Duration,
}

impl DatabaseConfig {
    pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout: Self::DEFAULT_BUSY_TIMEOUT,
        }
    }
}

/// File logging settings. Logging stays disabled while `log_dir` is `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidBusyTimeout(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidBusyTimeout(value) => write!(
                f,
                "{ENV_BUSY_TIMEOUT_MS} must be a whole number of milliseconds, got `{value}`"
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

fn non_blank_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
