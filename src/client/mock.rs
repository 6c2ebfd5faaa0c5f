//! In-memory manager API for tests and local development

use super::{ApiError, ManagerApi, ManagerTarget, Query, Result};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A request the mock received
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub manager: String,
    pub method: &'static str,
    pub path: String,
    pub query: Vec<(String, String)>,
}

impl RecordedCall {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Default)]
struct MockManager {
    /// Response to `GET queue` without a page parameter
    summary: Option<Result<Value>>,
    /// Response to `GET queue?page=..`
    page: Option<Result<Value>>,
    delete_error: Option<ApiError>,
}

/// Mock manager API
///
/// Each manager serves a scripted queue; every call is recorded so tests can
/// assert on DELETEs. Managers with nothing scripted answer with HTTP 404.
#[derive(Debug, Default)]
pub struct MockManagerApi {
    managers: Mutex<HashMap<String, MockManager>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockManagerApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `records` as the manager's whole queue
    pub fn set_queue(&self, manager: &str, records: Vec<Value>) {
        let body = json!({
            "page": 1,
            "pageSize": records.len(),
            "totalRecords": records.len(),
            "records": records,
        });
        let mut managers = lock(&self.managers);
        let entry = managers.entry(manager.to_string()).or_default();
        entry.summary = Some(Ok(body.clone()));
        entry.page = Some(Ok(body));
    }

    /// Override the response to the count request
    pub fn set_summary(&self, manager: &str, response: Result<Value>) {
        let mut managers = lock(&self.managers);
        managers.entry(manager.to_string()).or_default().summary = Some(response);
    }

    /// Override the response to the full-page request
    pub fn set_page(&self, manager: &str, response: Result<Value>) {
        let mut managers = lock(&self.managers);
        managers.entry(manager.to_string()).or_default().page = Some(response);
    }

    pub fn fail_deletes(&self, manager: &str, error: ApiError) {
        let mut managers = lock(&self.managers);
        managers.entry(manager.to_string()).or_default().delete_error = Some(error);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    pub fn deletes(&self) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.method == "DELETE")
            .collect()
    }

    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    fn record(&self, method: &'static str, target: &ManagerTarget, path: &str, query: &Query) {
        lock(&self.calls).push(RecordedCall {
            manager: target.name.clone(),
            method,
            path: path.to_string(),
            query: target.authenticated_query(query),
        });
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn not_found() -> ApiError {
    ApiError::Status {
        status: 404,
        reason: "Not Found".to_string(),
    }
}

#[async_trait]
impl ManagerApi for MockManagerApi {
    async fn get(&self, target: &ManagerTarget, path: &str, query: &Query) -> Result<Value> {
        self.record("GET", target, path, query);

        let managers = lock(&self.managers);
        let Some(manager) = managers.get(&target.name) else {
            return Err(not_found());
        };

        let paged = query.iter().any(|(key, _)| key == "page");
        let response = if paged { &manager.page } else { &manager.summary };
        response.clone().unwrap_or_else(|| Err(not_found()))
    }

    async fn delete(&self, target: &ManagerTarget, path: &str, query: &Query) -> Result<()> {
        self.record("DELETE", target, path, query);

        let managers = lock(&self.managers);
        match managers.get(&target.name).and_then(|m| m.delete_error.clone()) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
