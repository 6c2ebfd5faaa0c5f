//! Retry policy and exponential backoff for manager requests

use super::{ApiError, Result};
use crate::humanize::HumanDuration;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Classes of request failure a [`RetryPolicy`] can opt into retrying
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Connection refused, reset, DNS failure
    Connect,
    /// Timed out while establishing the connection
    ConnectTimeout,
    /// Timed out after the connection was up
    Timeout,
    /// Non-2xx HTTP status
    Status,
    /// Response body was not valid JSON
    Decode,
    Other,
}

/// Bounded exponential backoff
///
/// Delay before retry `n` (zero-based) is `min(max_delay, base_delay * 2^n)`.
/// HTTP status failures are never retried, even if listed in `retry_on`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay")]
    pub base_delay: HumanDuration,
    #[serde(default = "default_max_delay")]
    pub max_delay: HumanDuration,
    #[serde(default = "default_retry_on")]
    pub retry_on: Vec<FailureClass>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay: default_base_delay(),
            max_delay: default_max_delay(),
            retry_on: default_retry_on(),
        }
    }
}

fn default_max_attempts() -> u32 {
    10
}

fn default_base_delay() -> HumanDuration {
    HumanDuration::from_secs(4)
}

fn default_max_delay() -> HumanDuration {
    HumanDuration::from_secs(60)
}

fn default_retry_on() -> Vec<FailureClass> {
    vec![FailureClass::Connect, FailureClass::ConnectTimeout]
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn should_retry(&self, error: &ApiError) -> bool {
        let class = error.class();
        class != FailureClass::Status && self.retry_on.contains(&class)
    }

    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.base_delay
            .as_duration()
            .saturating_mul(factor)
            .min(self.max_delay.as_duration())
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or
    /// attempts run out
    ///
    /// Backoff sleeps end early with [`ApiError::Cancelled`] when `cancel`
    /// fires.
    pub async fn run<T, F, Fut>(&self, cancel: &CancellationToken, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempts = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(ApiError::Cancelled);
            }

            attempts += 1;

            let error = match op().await {
                Ok(value) => {
                    if attempts > 1 {
                        debug!(label, attempts, "Request succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) => e,
            };

            if !self.should_retry(&error) {
                return Err(error);
            }

            if attempts >= max_attempts {
                warn!(label, attempts, error = %error, "Request failed after retries");
                return Err(ApiError::RetriesExhausted {
                    attempts,
                    last_error: error.to_string(),
                });
            }

            let backoff = self.backoff(attempts - 1);
            warn!(
                label,
                attempts,
                backoff_ms = backoff.as_millis() as u64,
                error = %error,
                "Request failed, retrying"
            );

            tokio::select! {
                _ = cancel.cancelled() => return Err(ApiError::Cancelled),
                _ = tokio::time::sleep(backoff) => {}
            }
        }
    }
}
