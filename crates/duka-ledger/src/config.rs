//! Ledger engine configuration.
//!
//! Configuration is loaded from `DUKA_*` environment variables with fallback
//! to defaults.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use duka_db::DbConfig;

/// Ledger engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// SQLite database file (`DUKA_DATABASE_PATH`)
    pub database_path: PathBuf,

    /// Pool size (`DUKA_MAX_CONNECTIONS`)
    pub max_connections: u32,

    /// How many counter values a sale tries before giving up on a sale
    /// number collision (`DUKA_SALE_NUMBER_ATTEMPTS`)
    pub sale_number_attempts: u32,

    /// Similar-name matches returned by a duplicate check
    /// (`DUKA_DUPLICATE_NAME_MATCHES`)
    pub duplicate_name_matches: u32,

    /// Default page size of stock history (`DUKA_STOCK_HISTORY_LIMIT`)
    pub stock_history_limit: u32,

    /// Draw FIFO cost layers on sale (`DUKA_CONSUME_COST_LAYERS`)
    pub consume_cost_layers: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            database_path: PathBuf::from("./duka.db"),
            max_connections: 5,
            sale_number_attempts: 5,
            duplicate_name_matches: 5,
            stock_history_limit: 100,
            consume_cost_layers: false,
        }
    }
}

impl LedgerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup (the environment, a map in tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = LedgerConfig::default();

        let config = LedgerConfig {
            database_path: lookup("DUKA_DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),

            max_connections: parse_var(&lookup, "DUKA_MAX_CONNECTIONS", defaults.max_connections)?,

            sale_number_attempts: parse_var(
                &lookup,
                "DUKA_SALE_NUMBER_ATTEMPTS",
                defaults.sale_number_attempts,
            )?,

            duplicate_name_matches: parse_var(
                &lookup,
                "DUKA_DUPLICATE_NAME_MATCHES",
                defaults.duplicate_name_matches,
            )?,

            stock_history_limit: parse_var(
                &lookup,
                "DUKA_STOCK_HISTORY_LIMIT",
                defaults.stock_history_limit,
            )?,

            consume_cost_layers: parse_var(
                &lookup,
                "DUKA_CONSUME_COST_LAYERS",
                defaults.consume_cost_layers,
            )?,
        };

        if config.max_connections == 0 {
            return Err(ConfigError::InvalidValue("DUKA_MAX_CONNECTIONS".to_string()));
        }
        if config.sale_number_attempts == 0 {
            return Err(ConfigError::InvalidValue("DUKA_SALE_NUMBER_ATTEMPTS".to_string()));
        }

        Ok(config)
    }

    /// Pool configuration for [`duka_db::Database::new`].
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database_path.clone()).max_connections(self.max_connections)
    }

    /// Turns FIFO cost layer consumption on or off.
    pub fn consume_cost_layers(mut self, enabled: bool) -> Self {
        self.consume_cost_layers = enabled;
        self
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
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
