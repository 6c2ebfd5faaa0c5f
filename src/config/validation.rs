use super::models::Config;
use crate::client::ManagerTarget;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("No managers configured (at least one enabled manager is required)")]
    NoManagersConfigured,

    #[error("Manager '{manager}' has an invalid URL '{url}': {reason}")]
    InvalidManagerUrl {
        manager: String,
        url: String,
        reason: String,
    },

    #[error("Manager '{manager}' has no API key (set it in the config file or {env_var})")]
    MissingApiKey { manager: String, env_var: String },

    #[error("strike_threshold must be at least 1")]
    InvalidStrikeThreshold,

    #[error("stall_message must not be empty")]
    EmptyStallMessage,

    #[error("{field} must be greater than zero")]
    ZeroDuration { field: String },

    #[error("retry.max_attempts must be at least 1")]
    InvalidRetryAttempts,

    #[error("retry.base_delay ({base}) exceeds retry.max_delay ({max})")]
    RetryDelayOrder { base: String, max: String },
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_managers(config)?;
    validate_scheduler(config)?;
    validate_http(config)?;
    Ok(())
}

/// Every manager needs a usable URL; enabled ones also need a key
fn validate_managers(config: &Config) -> Result<(), ValidationError> {
    if !config.managers.values().any(|manager| manager.enabled) {
        return Err(ValidationError::NoManagersConfigured);
    }

    for (name, manager) in &config.managers {
        if let Err(e) = ManagerTarget::new(name.as_str(), &manager.url, "") {
            return Err(ValidationError::InvalidManagerUrl {
                manager: name.clone(),
                url: manager.url.clone(),
                reason: e.to_string(),
            });
        }

        let has_key = manager
            .api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty());

        if manager.enabled && !has_key {
            return Err(ValidationError::MissingApiKey {
                manager: name.clone(),
                env_var: super::sources::api_key_env_var(name),
            });
        }
    }

    Ok(())
}

fn validate_scheduler(config: &Config) -> Result<(), ValidationError> {
    if config.scheduler.strike_threshold == 0 {
        return Err(ValidationError::InvalidStrikeThreshold);
    }

    if config.scheduler.stall_message.trim().is_empty() {
        return Err(ValidationError::EmptyStallMessage);
    }

    if config.scheduler.poll_interval.is_zero() {
        return Err(ValidationError::ZeroDuration {
            field: "scheduler.poll_interval".to_string(),
        });
    }

    Ok(())
}

fn validate_http(config: &Config) -> Result<(), ValidationError> {
    let http = &config.http;

    if http.request_timeout.is_zero() {
        return Err(ValidationError::ZeroDuration {
            field: "http.request_timeout".to_string(),
        });
    }

    if http.connect_timeout.is_zero() {
        return Err(ValidationError::ZeroDuration {
            field: "http.connect_timeout".to_string(),
        });
    }

    if http.retry.max_attempts == 0 {
        return Err(ValidationError::InvalidRetryAttempts);
    }

    if http.retry.base_delay > http.retry.max_delay {
        return Err(ValidationError::RetryDelayOrder {
            base: http.retry.base_delay.to_string(),
            max: http.retry.max_delay.to_string(),
        });
    }

    Ok(())
}
