use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "STALLSWEEP_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/config.toml";
const ENV_PREFIX: &str = "STALLSWEEP";
const ENV_SEPARATOR: &str = "__";

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. Config file (if exists; TOML, YAML or JSON by extension)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables (highest priority)
///
/// `explicit_path` wins over `STALLSWEEP_CONFIG` and the default path.
/// Only the default path may be missing; a path the operator named must exist.
pub fn load(explicit_path: Option<PathBuf>) -> Result<Config, ConfigError> {
    // Load .env file if it exists (ignore errors if file doesn't exist)
    let _ = dotenvy::dotenv();

    let named_path = explicit_path.or_else(|| env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from));

    let mut config = match named_path {
        Some(path) => load_required(path)?,
        None => load_from_sources(PathBuf::from(DEFAULT_CONFIG_PATH))?,
    };

    load_secrets(&mut config, |name| env::var(name).ok());

    Ok(config)
}

/// Environment variable holding a manager's API key (`sonarr` -> `SONARR_API_KEY`)
pub fn api_key_env_var(manager: &str) -> String {
    let name: String = manager
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    format!("{}_API_KEY", name)
}

/// Fill manager API keys from the environment; the environment wins over the file
pub(crate) fn load_secrets(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    for (name, manager) in config.managers.iter_mut() {
        if let Some(key) = lookup(&api_key_env_var(name)).filter(|key| !key.trim().is_empty()) {
            manager.api_key = Some(key);
        }
    }
}

/// Like [`load_from_sources`], but a missing file is an error
pub fn load_required(config_path: PathBuf) -> Result<Config, ConfigError> {
    if !config_path.exists() {
        return Err(ConfigError::NotFound(config_path.display().to_string()));
    }
    load_from_sources(config_path)
}

/// Load configuration from a specific path and environment
/// Useful for testing with custom config files
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::warn!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // STALLSWEEP__SCHEDULER__POLL_INTERVAL -> scheduler.poll_interval
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize()
}
