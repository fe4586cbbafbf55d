//! Back office configuration.
//!
//! Configuration is loaded from environment variables with fallback to defaults.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use bazaar_core::{DEFAULT_LOW_STOCK_THRESHOLD, DEFAULT_TOP_LIMIT};
use bazaar_db::DbConfig;
use serde::Serialize;

/// Back office configuration.
#[derive(Debug, Clone, Serialize)]
pub struct BackofficeConfig {
    /// SQLite database file
    pub database_path: PathBuf,

    /// Pool size
    pub max_connections: u32,

    /// How long a writer waits for SQLite's write lock, in milliseconds
    pub busy_timeout_ms: u64,

    /// Default threshold for the low-stock counts
    pub low_stock_threshold: i64,

    /// Default row count for the top-N reports
    pub top_limit: usize,
}

impl BackofficeConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let config = BackofficeConfig {
            database_path: lookup("BAZAAR_DB_PATH")
                .filter(|p| !p.trim().is_empty())
                .unwrap_or_else(|| "./bazaar.db".to_string())
                .into(),

            max_connections: parse(&lookup, "BAZAAR_MAX_CONNECTIONS", 5)?,

            busy_timeout_ms: parse(&lookup, "BAZAAR_BUSY_TIMEOUT_MS", 5_000)?,

            low_stock_threshold: parse(
                &lookup,
                "BAZAAR_LOW_STOCK_THRESHOLD",
                DEFAULT_LOW_STOCK_THRESHOLD,
            )?,

            top_limit: parse(&lookup, "BAZAAR_TOP_LIMIT", DEFAULT_TOP_LIMIT)?,
        };

        if config.max_connections == 0 {
            return Err(ConfigError::InvalidValue("BAZAAR_MAX_CONNECTIONS".to_string()));
        }
        if config.low_stock_threshold < 0 {
            return Err(ConfigError::InvalidValue(
                "BAZAAR_LOW_STOCK_THRESHOLD".to_string(),
            ));
        }

        Ok(config)
    }

    /// Database settings for this configuration.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database_path)
            .max_connections(self.max_connections)
            .busy_timeout(Duration::from_millis(self.busy_timeout_ms))
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}
