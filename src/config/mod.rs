//! Configuration management for stallsweep
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. Configuration file (TOML, or YAML/JSON by extension)
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use stallsweep::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Polling every {}", config.scheduler.poll_interval);
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `STALLSWEEP__<section>__<key>`
//!
//! Examples:
//! - `STALLSWEEP__SCHEDULER__POLL_INTERVAL=5m`
//! - `STALLSWEEP__SCHEDULER__STRIKE_THRESHOLD=4`
//! - `STALLSWEEP__HTTP__RETRY__MAX_ATTEMPTS=3`
//!
//! API keys can also be supplied as `<MANAGER>_API_KEY`, e.g. `SONARR_API_KEY`.
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/config.toml`.
//! This can be overridden using the `STALLSWEEP_CONFIG` environment variable
//! or the `--config` flag.

mod models;
mod sources;
mod validation;

// Re-export public types
pub use crate::humanize::HumanDuration;
pub use models::{Config, HttpSettings, LoggingConfig, ManagerConfig, SchedulerConfig};
pub use sources::api_key_env_var;
pub use validation::ValidationError;

use crate::client::{ApiError, HttpConfig, ManagerTarget};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),

    #[error("Invalid manager target: {0}")]
    TargetError(#[from] ApiError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Environment variables (`STALLSWEEP__*`, `<MANAGER>_API_KEY`)
    /// 2. Config file (default: `config/config.toml`)
    /// 3. Default values
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(None)
    }

    /// Like [`Config::load`], reading the file at `path` when given
    pub fn load_with(path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let config = sources::load(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path, which must exist
    ///
    /// Useful for testing with custom configuration files.
    pub fn load_from_path(path: PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_required(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Enabled managers as request targets, in name order
    pub fn targets(&self) -> Result<Vec<ManagerTarget>, ConfigError> {
        self.managers
            .iter()
            .filter(|(_, manager)| manager.enabled)
            .map(|(name, manager)| -> Result<ManagerTarget, ConfigError> {
                let api_key = manager.api_key.clone().ok_or_else(|| ValidationError::MissingApiKey {
                    manager: name.clone(),
                    env_var: api_key_env_var(name),
                })?;

                let target = ManagerTarget::new(name.as_str(), &manager.url, api_key)?
                    .with_api_path(manager.api_path.as_str());
                Ok(target)
            })
            .collect()
    }

    /// HTTP client settings
    pub fn http_config(&self) -> HttpConfig {
        HttpConfig {
            connect_timeout: self.http.connect_timeout.as_duration(),
            request_timeout: self.http.request_timeout.as_duration(),
            user_agent: self.http.user_agent.clone(),
            retry: self.http.retry.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_load_minimal_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[managers.sonarr]
url = "http://sonarr:8989"
api_key = "abc"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        assert_eq!(config.managers.len(), 1);
        assert_eq!(config.scheduler.strike_threshold, 3);
    }

    #[test]
    fn test_missing_explicit_path_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("definitely-missing.toml");

        let result = Config::load_with(Some(config_path));
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::LoadError(config::ConfigError::NotFound(_))
        ));
    }

    #[test]
    fn test_validation_catches_missing_key() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[managers.zz_stallsweep_test_manager]
url = "http://sonarr:8989"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let result = Config::load_from_path(config_path);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::ValidationError(ValidationError::MissingApiKey { .. })
        ));
    }

    #[test]
    fn test_targets_in_name_order_skipping_disabled() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[managers.sonarr]
url = "http://sonarr:8989"
api_key = "s"

[managers.radarr]
url = "http://radarr:7878/"
api_key = "r"

[managers.lidarr]
url = "http://lidarr:8686"
api_key = "l"
api_path = "/api/v1/"
enabled = false
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        let targets = config.targets().unwrap();

        let names: Vec<&str> = targets.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["radarr", "sonarr"]);
        assert_eq!(targets[0].api_key, "r");
        assert_eq!(
            targets[0].endpoint("queue").unwrap().as_str(),
            "http://radarr:7878/api/v3/queue"
        );
    }

    #[test]
    fn test_full_config_example() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[scheduler]
poll_interval = "15m"
strike_threshold = 4
stall_message = "The download is stalled with no connections"

[http]
request_timeout = "45s"
connect_timeout = "5s"
user_agent = "stallsweep-test"

[http.retry]
max_attempts = 6
base_delay = "2s"
max_delay = "30s"
retry_on = ["connect", "connect_timeout", "timeout"]

[logging]
directory = "/var/log/stallsweep"
file_name = "sweep.log"
level = "debug"

[managers.sonarr]
url = "http://sonarr:8989"
api_key = "s"

[managers.radarr]
url = "http://radarr:7878"
api_key = "r"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = Config::load_from_path(config_path).unwrap();

        assert_eq!(config.scheduler.poll_interval.as_duration(), Duration::from_secs(900));
        assert_eq!(config.logging.file_name, "sweep.log");

        let http = config.http_config();
        assert_eq!(http.request_timeout, Duration::from_secs(45));
        assert_eq!(http.connect_timeout, Duration::from_secs(5));
        assert_eq!(http.user_agent, "stallsweep-test");
        assert_eq!(http.retry.max_attempts, 6);
        assert_eq!(http.retry.retry_on.len(), 3);

        assert_eq!(config.targets().unwrap().len(), 2);
    }
}
