//! HTTP client for manager queue APIs

use super::retry::RetryPolicy;
use super::{ApiError, ManagerApi, ManagerTarget, Query, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, Url};
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub user_agent: String,
    pub retry: RetryPolicy,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            user_agent: concat!("stallsweep/", env!("CARGO_PKG_VERSION")).to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

/// reqwest-backed [`ManagerApi`]
pub struct HttpManagerClient {
    client: Client,
    config: HttpConfig,
    cancel: CancellationToken,
}

impl HttpManagerClient {
    /// Create a new client; `cancel` aborts in-flight requests and backoff sleeps
    pub fn new(config: HttpConfig, cancel: CancellationToken) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| ApiError::Request(e.to_string()))?;

        Ok(Self {
            client,
            config,
            cancel,
        })
    }

    /// Issue a request with retry
    ///
    /// GET yields `Some(json)`, DELETE yields `None`. Failures are logged here
    /// and returned to the caller, which decides how to degrade.
    pub async fn request(
        &self,
        target: &ManagerTarget,
        method: Method,
        path: &str,
        query: &Query,
    ) -> Result<Option<Value>> {
        if method != Method::GET && method != Method::DELETE {
            let err = ApiError::UnsupportedMethod(method.to_string());
            error!(manager = %target.name, %method, path, error = %err, "Manager API request rejected");
            return Err(err);
        }

        let url = target.endpoint(path)?;
        let params = target.authenticated_query(query);
        let label = format!("{} {} {}", target.name, method, url.path());

        debug!(manager = %target.name, %method, url = %url, "Sending manager API request");

        let result = self
            .config
            .retry
            .run(&self.cancel, &label, || self.request_once(&method, &url, &params))
            .await;

        match &result {
            Ok(_) => {}
            Err(ApiError::Cancelled) => {
                info!(manager = %target.name, %method, path, "Manager API request cancelled");
            }
            Err(e) => {
                error!(manager = %target.name, %method, path, error = %e, "Manager API request failed");
            }
        }

        result
    }

    /// Single attempt (no retry)
    async fn request_once(
        &self,
        method: &Method,
        url: &Url,
        params: &[(String, String)],
    ) -> Result<Option<Value>> {
        let request = self
            .client
            .request(method.clone(), url.clone())
            .query(params);

        let response = tokio::select! {
            _ = self.cancel.cancelled() => return Err(ApiError::Cancelled),
            sent = request.send() => sent.map_err(classify)?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        if *method == Method::DELETE {
            return Ok(None);
        }

        let bytes = tokio::select! {
            _ = self.cancel.cancelled() => return Err(ApiError::Cancelled),
            body = response.bytes() => body.map_err(classify)?,
        };
        let value = serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))?;

        debug!(url = %url.path(), size = bytes.len(), "Manager API response received");

        Ok(Some(value))
    }
}

/// Map a transport error onto the retry taxonomy
///
/// The URL is stripped because its query carries the API key.
fn classify(err: reqwest::Error) -> ApiError {
    let connect = err.is_connect();
    let timeout = err.is_timeout();
    let decode = err.is_decode() || err.is_body();
    let message = err.without_url().to_string();

    match (connect, timeout) {
        (true, true) => ApiError::ConnectTimeout(message),
        (true, false) => ApiError::Connect(message),
        (false, true) => ApiError::Timeout(message),
        (false, false) if decode => ApiError::Decode(message),
        (false, false) => ApiError::Request(message),
    }
}

#[async_trait]
impl ManagerApi for HttpManagerClient {
    async fn get(&self, target: &ManagerTarget, path: &str, query: &Query) -> Result<Value> {
        let body = self.request(target, Method::GET, path, query).await?;
        Ok(body.unwrap_or(Value::Null))
    }

    async fn delete(&self, target: &ManagerTarget, path: &str, query: &Query) -> Result<()> {
        self.request(target, Method::DELETE, path, query).await?;
        Ok(())
    }
}
