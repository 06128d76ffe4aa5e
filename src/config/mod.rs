//! Configuration management for grabd
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use grabd::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Server listening on: {}", config.server.bind_addr);
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `GRABD__<section>__<key>`
//!
//! Examples:
//! - `GRABD__SERVER__BIND_ADDR=0.0.0.0:9000`
//! - `GRABD__DOWNLOAD__OUTPUT_PATH=/srv/media`
//! - `GRABD__JOBS__MAX_CONCURRENT_JOBS=4`
//!
//! The access token can also be supplied as `GRABD_TOKEN`.
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/grabd.toml`.
//! This can be overridden using the `GRABD_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use crate::humanize::ByteSize;
pub use models::{ApiLimits, Config, DownloadConfig, JobsConfig, ServerConfig};
pub use validation::ValidationError;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Environment variables (`GRABD__*`, `GRABD_TOKEN`)
    /// 2. TOML file (default: `config/grabd.toml`)
    /// 3. Default values
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(None)
    }

    /// Like [`Config::load`], reading the TOML file from `path` when given
    pub fn load_with(path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let config = sources::load(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    ///
    /// Useful for testing with custom configuration files.
    pub fn load_from_path(path: PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_minimal_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        fs::write(&config_path, "[server]\ntoken = \"abc\"\n").unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        assert_eq!(config.server.token, "abc");
        assert_eq!(config.jobs.history_capacity, 10);
    }

    #[test]
    fn test_validation_runs_after_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        fs::write(&config_path, "[jobs]\nhistory_capacity = 0\n").unwrap();

        let result = Config::load_from_path(config_path);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::ValidationError(ValidationError::ZeroHistoryCapacity)
        ));
    }

    #[test]
    fn test_full_config_example() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[server]
bind_addr = "0.0.0.0:8080"
token = "t0k3n"
debug = true

[server.api]
max_payload_bytes = "64KB"

[download]
output_path = "media"
chunk_size = 2097152
multi_thread = true
retry_times = 10

[jobs]
history_capacity = 10
max_concurrent_jobs = 8
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = Config::load_from_path(config_path).unwrap();

        assert!(config.server.debug);
        assert_eq!(config.download.chunk_size.as_u64(), 2 * 1024 * 1024);
        assert!(config.download.multi_thread);
        assert_eq!(config.download.retry_times, 10);
        assert_eq!(config.jobs.max_concurrent_jobs, 8);
    }
}
