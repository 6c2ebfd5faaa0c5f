use crate::client::{DEFAULT_API_PATH, RetryPolicy};
use crate::humanize::HumanDuration;
use crate::queue::DEFAULT_STALL_MESSAGE;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub http: HttpSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Managers keyed by name; polled in name order
    #[serde(default)]
    pub managers: BTreeMap<String, ManagerConfig>,
}

/// Poll loop and strike settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval: HumanDuration,
    /// Consecutive stalled observations before a download is evicted
    #[serde(default = "default_strike_threshold")]
    pub strike_threshold: u32,
    /// Exact error message that marks a download as stalled
    #[serde(default = "default_stall_message")]
    pub stall_message: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            strike_threshold: default_strike_threshold(),
            stall_message: default_stall_message(),
        }
    }
}

fn default_poll_interval() -> HumanDuration {
    HumanDuration::from_secs(600)
}

fn default_strike_threshold() -> u32 {
    3
}

fn default_stall_message() -> String {
    DEFAULT_STALL_MESSAGE.to_string()
}

/// Outbound HTTP settings shared by every manager
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpSettings {
    #[serde(default = "default_request_timeout")]
    pub request_timeout: HumanDuration,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: HumanDuration,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            request_timeout: default_request_timeout(),
            connect_timeout: default_connect_timeout(),
            user_agent: default_user_agent(),
            retry: RetryPolicy::default(),
        }
    }
}

fn default_request_timeout() -> HumanDuration {
    HumanDuration::from_secs(30)
}

fn default_connect_timeout() -> HumanDuration {
    HumanDuration::from_secs(10)
}

fn default_user_agent() -> String {
    concat!("stallsweep/", env!("CARGO_PKG_VERSION")).to_string()
}

/// Log output settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Directory for the log file; stdout only when unset
    pub directory: Option<PathBuf>,
    #[serde(default = "default_log_file_name")]
    pub file_name: String,
    /// Filter used when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: None,
            file_name: default_log_file_name(),
            level: default_log_level(),
        }
    }
}

fn default_log_file_name() -> String {
    "stallsweep.log".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// One download manager (Sonarr, Radarr, ...)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ManagerConfig {
    pub url: String,
    /// May also come from `<NAME>_API_KEY`
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default = "default_api_path")]
    pub api_path: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_api_path() -> String {
    DEFAULT_API_PATH.to_string()
}

fn default_enabled() -> bool {
    true
}
