//! Full-queue fetch: count the records, then read them as a single page

use crate::client::{ApiError, ManagerApi, ManagerTarget};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

const QUEUE_PATH: &str = "queue";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("queue request failed: {0}")]
    Api(#[from] ApiError),

    #[error("queue response is missing the \"records\" array")]
    MissingRecords,

    #[error("queue fetch cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, FetchError>;

/// Read `totalRecords` from the queue endpoint
///
/// A failed request or a missing/invalid field counts as an empty queue.
/// Only cancellation is reported as an error.
pub async fn count_records(api: &dyn ManagerApi, target: &ManagerTarget) -> Result<u64> {
    let summary = match api.get(target, QUEUE_PATH, &[]).await {
        Ok(summary) => summary,
        Err(ApiError::Cancelled) => return Err(FetchError::Cancelled),
        Err(e) => {
            warn!(manager = %target.name, error = %e, "Failed to count queue records, assuming empty queue");
            return Ok(0);
        }
    };

    match summary.get("totalRecords").and_then(Value::as_u64) {
        Some(total) => Ok(total),
        None => {
            warn!(manager = %target.name, "Queue response has no usable \"totalRecords\", assuming empty queue");
            Ok(0)
        }
    }
}

/// Fetch the manager's entire queue in one page sized to the record count
///
/// Returns raw records; they are validated one by one by the evaluator.
pub async fn fetch_full_queue(api: &dyn ManagerApi, target: &ManagerTarget) -> Result<Vec<Value>> {
    let total = count_records(api, target).await?;
    if total == 0 {
        info!(manager = %target.name, "No records in queue");
        return Ok(Vec::new());
    }

    debug!(manager = %target.name, total, "Fetching full queue");

    let query = [
        ("page".to_string(), "1".to_string()),
        ("pageSize".to_string(), total.to_string()),
    ];

    let mut page = api.get(target, QUEUE_PATH, &query).await.map_err(|e| match e {
        ApiError::Cancelled => FetchError::Cancelled,
        other => FetchError::Api(other),
    })?;

    match page.get_mut("records").map(Value::take) {
        Some(Value::Array(records)) => Ok(records),
        _ => Err(FetchError::MissingRecords),
    }
}
