//! Manager download queue: record model and full-queue fetcher

pub mod fetcher;
pub mod models;

pub use fetcher::{FetchError, count_records, fetch_full_queue};
pub use models::{DEFAULT_STALL_MESSAGE, QueueRecord, RecordError, STALLED_STATUS};
