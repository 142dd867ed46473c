// Configuration module for the referral node
//
// This module handles loading and managing the node configuration

use crate::error::{ReferralNodeError, Result};
use crate::storage::StorageBackend;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Default SQLite database location, shared by the config default and the CLI
/// backend override.
pub const DEFAULT_DATABASE_PATH: &str = "data/referrals.db";

/// Referral node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// API configuration
    pub api: ApiConfig,
    /// Storage configuration
    pub storage: StorageConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API bind address in the format "IP:port"
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Whether to expose the debug state-dump endpoint.
    ///
    /// The dump discloses the full referral graph; leave this off anywhere
    /// that is not a development deployment.
    #[serde(default = "default_false")]
    pub enable_debug_endpoint: bool,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Backend selection, a tagged variant chosen once at startup
    #[serde(flatten)]
    pub backend: StorageBackend,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_bind_address() -> String {
    "127.0.0.1:8888".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_false() -> bool {
    false
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                bind_address: default_bind_address(),
                enable_debug_endpoint: false,
            },
            storage: StorageConfig {
                backend: StorageBackend::Sqlite {
                    database_path: DEFAULT_DATABASE_PATH.to_string(),
                },
            },
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path)
            .map_err(|e| ReferralNodeError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&config_str)
            .map_err(|e| ReferralNodeError::Config(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let config_str = toml::to_string_pretty(self)
            .map_err(|e| ReferralNodeError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, config_str)
            .map_err(|e| ReferralNodeError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }
}

/// Generate a default configuration file at the given path if it doesn't exist
pub fn ensure_default_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    if !path.as_ref().exists() {
        let default_config = Config::default();
        default_config.to_file(&path)?;
        return Ok(default_config);
    }

    Config::from_file(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sqlite_backend() {
        let config: Config = toml::from_str(
            r#"
            [api]
            bind_address = "0.0.0.0:8080"

            [storage]
            backend = "sqlite"
            database_path = "data/test.db"
            "#,
        )
        .unwrap();

        assert_eq!(config.api.bind_address, "0.0.0.0:8080");
        assert!(!config.api.enable_debug_endpoint);
        assert_eq!(
            config.storage.backend,
            StorageBackend::Sqlite {
                database_path: "data/test.db".to_string()
            }
        );
    }

    #[test]
    fn parses_memory_backend() {
        let config: Config = toml::from_str(
            r#"
            [api]
            enable_debug_endpoint = true

            [storage]
            backend = "memory"
            "#,
        )
        .unwrap();

        assert!(config.api.enable_debug_endpoint);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
    }

    #[test]
    fn default_config_round_trips_through_toml() {
        let rendered = toml::to_string_pretty(&Config::default()).unwrap();
        let parsed: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.storage.backend, Config::default().storage.backend);
    }
}
