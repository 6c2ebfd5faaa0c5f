//! Manager API client
//!
//! Everything that talks to a download manager goes through the
//! [`ManagerApi`] trait. The production implementation is
//! [`HttpManagerClient`], which adds API-key auth, per-request timeouts and
//! bounded exponential-backoff retry on connection-level failures.
//! [`mock::MockManagerApi`] is an in-memory stand-in used by tests.

pub mod http;
pub mod mock;
pub mod retry;

pub use http::{HttpConfig, HttpManagerClient};
pub use retry::{FailureClass, RetryPolicy};

use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Default API prefix for Sonarr/Radarr v3
pub const DEFAULT_API_PATH: &str = "/api/v3/";

/// Query parameter carrying the API key
pub const API_KEY_PARAM: &str = "apikey";

pub type Query = [(String, String)];

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Connection timeout: {0}")]
    ConnectTimeout(String),

    #[error("Request timeout: {0}")]
    Timeout(String),

    #[error("HTTP {status}: {reason}")]
    Status { status: u16, reason: String },

    #[error("Malformed response body: {0}")]
    Decode(String),

    #[error("HTTP request failed: {0}")]
    Request(String),

    #[error("Failed after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    #[error("Request cancelled")]
    Cancelled,
}

impl ApiError {
    /// Failure class used by [`RetryPolicy`] to decide whether to retry
    pub fn class(&self) -> FailureClass {
        match self {
            ApiError::Connect(_) => FailureClass::Connect,
            ApiError::ConnectTimeout(_) => FailureClass::ConnectTimeout,
            ApiError::Timeout(_) => FailureClass::Timeout,
            ApiError::Status { .. } => FailureClass::Status,
            ApiError::Decode(_) => FailureClass::Decode,
            _ => FailureClass::Other,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ApiError::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

/// A download manager the sweeper polls
#[derive(Clone, PartialEq, Eq)]
pub struct ManagerTarget {
    pub name: String,
    pub base_url: Url,
    pub api_key: String,
    pub api_path: String,
}

impl ManagerTarget {
    pub fn new(name: impl Into<String>, base_url: &str, api_key: impl Into<String>) -> Result<Self> {
        let base_url =
            Url::parse(base_url).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        match base_url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(ApiError::InvalidUrl(format!(
                    "{}: unsupported scheme '{}'",
                    base_url, other
                )));
            }
        }

        Ok(Self {
            name: name.into(),
            base_url,
            api_key: api_key.into(),
            api_path: DEFAULT_API_PATH.to_string(),
        })
    }

    pub fn with_api_path(mut self, api_path: impl Into<String>) -> Self {
        self.api_path = api_path.into();
        self
    }

    /// Resolve `path` below the manager's API prefix
    ///
    /// Standard URL joining: an absolute `api_path` such as `/api/v3/`
    /// replaces any path on the base URL, a relative one is resolved against it.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        let api_path = if self.api_path.ends_with('/') {
            self.api_path.clone()
        } else {
            format!("{}/", self.api_path)
        };

        self.base_url
            .join(&api_path)
            .and_then(|api| api.join(path.trim_start_matches('/')))
            .map_err(|e| ApiError::InvalidUrl(format!("{}{}: {}", api_path, path, e)))
    }

    /// Auth parameter first, then caller parameters (a caller `apikey` is dropped)
    pub fn authenticated_query(&self, query: &Query) -> Vec<(String, String)> {
        let mut params = Vec::with_capacity(query.len() + 1);
        params.push((API_KEY_PARAM.to_string(), self.api_key.clone()));
        params.extend(
            query
                .iter()
                .filter(|(name, _)| !name.eq_ignore_ascii_case(API_KEY_PARAM))
                .cloned(),
        );
        params
    }
}

impl fmt::Debug for ManagerTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagerTarget")
            .field("name", &self.name)
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &"<redacted>")
            .field("api_path", &self.api_path)
            .finish()
    }
}

/// Queue API of a download manager
#[async_trait]
pub trait ManagerApi: Send + Sync {
    /// GET `path` and return the parsed JSON body
    async fn get(&self, target: &ManagerTarget, path: &str, query: &Query) -> Result<Value>;

    /// DELETE `path`; success carries no body
    async fn delete(&self, target: &ManagerTarget, path: &str, query: &Query) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> ManagerTarget {
        ManagerTarget::new("sonarr", "http://sonarr:8989", "secret").unwrap()
    }

    #[test]
    fn test_endpoint_joins_api_prefix() {
        let url = target().endpoint("queue").unwrap();
        assert_eq!(url.as_str(), "http://sonarr:8989/api/v3/queue");

        let url = target().endpoint("queue/7").unwrap();
        assert_eq!(url.as_str(), "http://sonarr:8989/api/v3/queue/7");
    }

    #[test]
    fn test_absolute_api_path_replaces_base_path() {
        let target = ManagerTarget::new("radarr", "https://media.local/radarr", "k").unwrap();
        let url = target.endpoint("/queue").unwrap();
        assert_eq!(url.as_str(), "https://media.local/api/v3/queue");

        let target = ManagerTarget::new("radarr", "https://media.local/radarr/", "k").unwrap();
        let url = target.endpoint("queue").unwrap();
        assert_eq!(url.as_str(), "https://media.local/api/v3/queue");
    }

    #[test]
    fn test_relative_api_path_resolves_against_base() {
        let target = ManagerTarget::new("radarr", "https://media.local/radarr/", "k")
            .unwrap()
            .with_api_path("api/v3/");
        let url = target.endpoint("queue/7").unwrap();
        assert_eq!(url.as_str(), "https://media.local/radarr/api/v3/queue/7");
    }

    #[test]
    fn test_endpoint_custom_api_path() {
        let target = target().with_api_path("api/v1");
        let url = target.endpoint("queue").unwrap();
        assert_eq!(url.as_str(), "http://sonarr:8989/api/v1/queue");
    }

    #[test]
    fn test_rejects_non_http_scheme() {
        let result = ManagerTarget::new("bad", "ftp://sonarr", "k");
        assert!(matches!(result, Err(ApiError::InvalidUrl(_))));
    }

    #[test]
    fn test_authenticated_query_auth_wins() {
        let query = vec![
            ("apikey".to_string(), "override".to_string()),
            ("page".to_string(), "1".to_string()),
        ];
        let params = target().authenticated_query(&query);
        assert_eq!(
            params,
            vec![
                ("apikey".to_string(), "secret".to_string()),
                ("page".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let rendered = format!("{:?}", target());
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_error_classes() {
        assert_eq!(ApiError::Connect("refused".into()).class(), FailureClass::Connect);
        assert_eq!(
            ApiError::Status { status: 500, reason: "Internal Server Error".into() }.class(),
            FailureClass::Status
        );
        assert_eq!(ApiError::Cancelled.class(), FailureClass::Other);
    }
}
