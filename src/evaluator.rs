//! Stall evaluation and eviction
//!
//! Each queue record goes through one of four paths per pass: malformed
//! (skipped), not stalled (ignored), stalled below the threshold (one more
//! strike), or stalled at the threshold (DELETE with blocklist, then the
//! strike entry is dropped whatever the DELETE returned).
//!
//! A record that stops being stalled keeps whatever strikes it had.

use crate::client::{ApiError, ManagerApi, ManagerTarget};
use crate::queue::{QueueRecord, RecordError};
use crate::strikes::{StrikeKey, StrikeTracker};
use serde_json::Value;
use tracing::{error, info, warn};

/// Outcome for a single record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Malformed(RecordError),
    Healthy,
    Struck { strikes: u32 },
    Evicted { deleted: bool },
    /// The eviction DELETE was cut short by shutdown
    Interrupted,
}

/// Per-pass counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub records: usize,
    pub malformed: usize,
    /// Strikes handed out this pass (including those that led to eviction)
    pub stalled: usize,
    pub evicted: usize,
    pub eviction_failures: usize,
}

#[derive(Debug, Clone)]
pub struct StallEvaluator {
    threshold: u32,
    stall_message: String,
}

impl StallEvaluator {
    /// A threshold of 0 is treated as 1
    pub fn new(threshold: u32, stall_message: impl Into<String>) -> Self {
        Self {
            threshold: threshold.max(1),
            stall_message: stall_message.into(),
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Evaluate every record in queue order
    pub async fn evaluate(
        &self,
        api: &dyn ManagerApi,
        target: &ManagerTarget,
        records: &[Value],
        strikes: &mut StrikeTracker,
    ) -> PassSummary {
        let mut summary = PassSummary::default();

        for raw in records {
            summary.records += 1;

            match self.evaluate_record(api, target, raw, strikes).await {
                Verdict::Malformed(_) => summary.malformed += 1,
                Verdict::Healthy => {}
                Verdict::Struck { .. } => summary.stalled += 1,
                Verdict::Evicted { deleted } => {
                    summary.stalled += 1;
                    if deleted {
                        summary.evicted += 1;
                    } else {
                        summary.eviction_failures += 1;
                    }
                }
                Verdict::Interrupted => {
                    summary.stalled += 1;
                    summary.eviction_failures += 1;
                    break;
                }
            }
        }

        summary
    }

    pub async fn evaluate_record(
        &self,
        api: &dyn ManagerApi,
        target: &ManagerTarget,
        raw: &Value,
        strikes: &mut StrikeTracker,
    ) -> Verdict {
        let record = match QueueRecord::from_value(raw) {
            Ok(record) => record,
            Err(e) => {
                warn!(manager = %target.name, error = %e, record = %raw, "Skipping malformed queue record");
                return Verdict::Malformed(e);
            }
        };

        info!(manager = %target.name, id = record.id, title = %record.title, status = %record.status, "Checking the status of {}", record.title);

        if !record.is_stalled(&self.stall_message) {
            return Verdict::Healthy;
        }

        let key = StrikeKey::new(target.name.as_str(), record.id);
        let count = strikes.observe_stall(&key);
        info!(
            manager = %target.name,
            id = record.id,
            strikes = count,
            threshold = self.threshold,
            "Item {} has {} strikes", record.title, count
        );

        if count < self.threshold {
            return Verdict::Struck { strikes: count };
        }

        info!(
            manager = %target.name,
            id = record.id,
            download_client = record.download_client.as_deref().unwrap_or("unknown"),
            "Removing stalled download: {}", record.title
        );

        let result = api
            .delete(target, &format!("queue/{}", record.id), &eviction_query())
            .await;

        // Dropped even when the DELETE failed, so a stuck record cannot
        // trigger a DELETE on every later pass
        strikes.clear(&key);

        match result {
            Ok(()) => Verdict::Evicted { deleted: true },
            Err(ApiError::Cancelled) => Verdict::Interrupted,
            Err(e) => {
                error!(manager = %target.name, id = record.id, error = %e, "Failed to remove stalled download: {}", record.title);
                Verdict::Evicted { deleted: false }
            }
        }
    }
}

fn eviction_query() -> [(String, String); 2] {
    [
        ("removeFromClient".to_string(), "true".to_string()),
        ("blocklist".to_string(), "true".to_string()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::MockManagerApi;
    use crate::queue::DEFAULT_STALL_MESSAGE;
    use serde_json::json;

    fn target(name: &str) -> ManagerTarget {
        ManagerTarget::new(name, "http://localhost:8989", "key").unwrap()
    }

    fn stalled(id: i64) -> Value {
        json!({
            "id": id,
            "title": format!("Stalled.{id}"),
            "status": "warning",
            "trackedDownloadStatus": "warning",
            "errorMessage": DEFAULT_STALL_MESSAGE
        })
    }

    fn evaluator(threshold: u32) -> StallEvaluator {
        StallEvaluator::new(threshold, DEFAULT_STALL_MESSAGE)
    }

    #[tokio::test]
    async fn test_below_threshold_never_deletes() {
        let api = MockManagerApi::new();
        let sonarr = target("sonarr");
        let mut strikes = StrikeTracker::new();
        let evaluator = evaluator(5);

        for expected in 1..5 {
            let verdict = evaluator
                .evaluate_record(&api, &sonarr, &stalled(7), &mut strikes)
                .await;
            assert_eq!(verdict, Verdict::Struck { strikes: expected });
            assert_eq!(strikes.count(&StrikeKey::new("sonarr", 7)), expected);
        }

        assert!(api.deletes().is_empty());
    }

    #[tokio::test]
    async fn test_threshold_deletes_once_and_clears() {
        let api = MockManagerApi::new();
        let sonarr = target("sonarr");
        let mut strikes = StrikeTracker::new();
        let evaluator = evaluator(3);
        let key = StrikeKey::new("sonarr", 7);

        for _ in 0..2 {
            evaluator.evaluate_record(&api, &sonarr, &stalled(7), &mut strikes).await;
        }
        let verdict = evaluator
            .evaluate_record(&api, &sonarr, &stalled(7), &mut strikes)
            .await;

        assert_eq!(verdict, Verdict::Evicted { deleted: true });
        assert_eq!(strikes.count(&key), 0);

        let deletes = api.deletes();
        assert_eq!(deletes.len(), 1);
        assert_eq!(deletes[0].path, "queue/7");
        assert_eq!(deletes[0].param("removeFromClient"), Some("true"));
        assert_eq!(deletes[0].param("blocklist"), Some("true"));
        assert_eq!(deletes[0].param("apikey"), Some("key"));
    }

    #[tokio::test]
    async fn test_threshold_of_one_evicts_immediately() {
        let api = MockManagerApi::new();
        let mut strikes = StrikeTracker::new();

        let verdict = evaluator(1)
            .evaluate_record(&api, &target("radarr"), &stalled(9), &mut strikes)
            .await;

        assert_eq!(verdict, Verdict::Evicted { deleted: true });
        assert_eq!(api.deletes().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_delete_still_clears_strikes() {
        let api = MockManagerApi::new();
        api.fail_deletes("sonarr", ApiError::Status { status: 500, reason: "Internal Server Error".into() });
        let sonarr = target("sonarr");
        let mut strikes = StrikeTracker::new();
        let evaluator = evaluator(2);

        evaluator.evaluate_record(&api, &sonarr, &stalled(7), &mut strikes).await;
        let verdict = evaluator
            .evaluate_record(&api, &sonarr, &stalled(7), &mut strikes)
            .await;

        assert_eq!(verdict, Verdict::Evicted { deleted: false });
        assert_eq!(strikes.count(&StrikeKey::new("sonarr", 7)), 0);
        assert_eq!(api.deletes().len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_record_leaves_state_untouched() {
        let api = MockManagerApi::new();
        let mut strikes = StrikeTracker::new();
        let record = json!({
            "id": 7,
            "status": "warning",
            "trackedDownloadStatus": "warning",
            "errorMessage": DEFAULT_STALL_MESSAGE
        });

        let verdict = evaluator(1)
            .evaluate_record(&api, &target("sonarr"), &record, &mut strikes)
            .await;

        assert_eq!(verdict, Verdict::Malformed(RecordError::MissingField("title")));
        assert!(strikes.is_empty());
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_warning_with_other_message_is_not_a_strike() {
        let api = MockManagerApi::new();
        let mut strikes = StrikeTracker::new();
        let record = json!({
            "id": 7,
            "title": "X",
            "status": "warning",
            "trackedDownloadStatus": "warning",
            "errorMessage": "Unable to import: no files found"
        });

        let verdict = evaluator(1)
            .evaluate_record(&api, &target("sonarr"), &record, &mut strikes)
            .await;

        assert_eq!(verdict, Verdict::Healthy);
        assert!(strikes.is_empty());
        assert!(api.deletes().is_empty());
    }

    #[tokio::test]
    async fn test_recovered_record_keeps_strikes() {
        let api = MockManagerApi::new();
        let sonarr = target("sonarr");
        let mut strikes = StrikeTracker::new();
        let evaluator = evaluator(3);
        let mut record = stalled(7);

        evaluator.evaluate_record(&api, &sonarr, &record, &mut strikes).await;
        record["status"] = json!("downloading");
        let verdict = evaluator.evaluate_record(&api, &sonarr, &record, &mut strikes).await;

        assert_eq!(verdict, Verdict::Healthy);
        assert_eq!(strikes.count(&StrikeKey::new("sonarr", 7)), 1);
    }

    #[tokio::test]
    async fn test_same_id_isolated_across_managers() {
        let api = MockManagerApi::new();
        let mut strikes = StrikeTracker::new();
        let evaluator = evaluator(2);

        evaluator.evaluate_record(&api, &target("sonarr"), &stalled(42), &mut strikes).await;
        evaluator.evaluate_record(&api, &target("radarr"), &stalled(42), &mut strikes).await;

        assert_eq!(strikes.count(&StrikeKey::new("sonarr", 42)), 1);
        assert_eq!(strikes.count(&StrikeKey::new("radarr", 42)), 1);
        assert!(api.deletes().is_empty());
    }

    #[tokio::test]
    async fn test_evaluate_summarizes_pass() {
        let api = MockManagerApi::new();
        let mut strikes = StrikeTracker::new();
        strikes.observe_stall(&StrikeKey::new("sonarr", 2));

        let records = vec![
            stalled(1),
            stalled(2),
            json!({"id": 3, "title": "Fine", "status": "downloading", "trackedDownloadStatus": "ok"}),
            json!("not a record"),
        ];

        let summary = evaluator(2)
            .evaluate(&api, &target("sonarr"), &records, &mut strikes)
            .await;

        assert_eq!(
            summary,
            PassSummary {
                records: 4,
                malformed: 1,
                stalled: 2,
                evicted: 1,
                eviction_failures: 0,
            }
        );
        assert_eq!(api.deletes()[0].path, "queue/2");
    }

    #[tokio::test]
    async fn test_cancelled_delete_stops_pass() {
        let api = MockManagerApi::new();
        api.fail_deletes("sonarr", ApiError::Cancelled);
        let mut strikes = StrikeTracker::new();

        let summary = evaluator(1)
            .evaluate(&api, &target("sonarr"), &[stalled(1), stalled(2)], &mut strikes)
            .await;

        assert_eq!(summary.records, 1);
        assert_eq!(api.deletes().len(), 1);
        assert!(strikes.is_empty());
    }

    #[test]
    fn test_malformed_verdict_is_cloneable() {
        let verdict = Verdict::Malformed(RecordError::MissingField("id"));
        let copy = verdict.clone();
        assert_eq!(copy, verdict);
    }

    #[test]
    fn test_zero_threshold_treated_as_one() {
        assert_eq!(StallEvaluator::new(0, DEFAULT_STALL_MESSAGE).threshold(), 1);
    }
}
