use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Queue status a stalled download reports
pub const STALLED_STATUS: &str = "warning";

/// Error message the managers attach to downloads with no peers
pub const DEFAULT_STALL_MESSAGE: &str = "The download is stalled with no connections";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("record is not a JSON object")]
    NotAnObject,

    #[error("record is missing required field '{0}'")]
    MissingField(&'static str),

    #[error("record has an invalid shape: {0}")]
    InvalidShape(String),
}

/// Wire shape of a queue record; everything optional so that one bad record
/// cannot fail the whole page
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawQueueRecord {
    id: Option<i64>,
    title: Option<String>,
    status: Option<String>,
    tracked_download_status: Option<String>,
    error_message: Option<String>,
    download_id: Option<String>,
    download_client: Option<String>,
}

/// One entry of a manager's download queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueRecord {
    pub id: i64,
    pub title: String,
    pub status: String,
    pub tracked_download_status: String,
    pub error_message: Option<String>,
    pub download_id: Option<String>,
    pub download_client: Option<String>,
}

impl QueueRecord {
    /// Parse a raw record, requiring `id`, `title`, `status` and
    /// `trackedDownloadStatus`
    pub fn from_value(value: &Value) -> Result<Self, RecordError> {
        if !value.is_object() {
            return Err(RecordError::NotAnObject);
        }

        let raw: RawQueueRecord = serde_json::from_value(value.clone())
            .map_err(|e| RecordError::InvalidShape(e.to_string()))?;

        Ok(Self {
            id: raw.id.ok_or(RecordError::MissingField("id"))?,
            title: raw.title.ok_or(RecordError::MissingField("title"))?,
            status: raw.status.ok_or(RecordError::MissingField("status"))?,
            tracked_download_status: raw
                .tracked_download_status
                .ok_or(RecordError::MissingField("trackedDownloadStatus"))?,
            error_message: raw.error_message,
            download_id: raw.download_id,
            download_client: raw.download_client,
        })
    }

    /// Status is exactly `warning` and the error message is exactly `signature`
    pub fn is_stalled(&self, signature: &str) -> bool {
        self.status == STALLED_STATUS && self.error_message.as_deref() == Some(signature)
    }
}
