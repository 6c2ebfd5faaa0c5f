//! Sweep loop
//!
//! One cycle runs a pass per manager, strictly in sequence, then sleeps for
//! the poll interval. A failing manager is logged and skipped; it never stops
//! the other managers or the loop. Cancellation is observed between managers,
//! during the sleep, and inside every request.

use crate::client::{ManagerApi, ManagerTarget};
use crate::evaluator::{PassSummary, StallEvaluator};
use crate::humanize::HumanDuration;
use crate::observability::Metrics;
use crate::queue::{FetchError, fetch_full_queue};
use crate::strikes::StrikeTracker;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum PassError {
    #[error("queue unavailable: {0}")]
    Fetch(FetchError),

    #[error("pass cancelled")]
    Cancelled,
}

impl From<FetchError> for PassError {
    fn from(value: FetchError) -> Self {
        match value {
            FetchError::Cancelled => PassError::Cancelled,
            other => PassError::Fetch(other),
        }
    }
}

/// Fetch one manager's queue and evaluate every record in it
pub async fn run_pass(
    api: &dyn ManagerApi,
    evaluator: &StallEvaluator,
    target: &ManagerTarget,
    strikes: &mut StrikeTracker,
) -> Result<PassSummary, PassError> {
    let records = fetch_full_queue(api, target).await?;
    if records.is_empty() {
        return Ok(PassSummary::default());
    }

    info!(manager = %target.name, records = records.len(), "Processing {} queue...", target.name);
    Ok(evaluator.evaluate(api, target, &records, strikes).await)
}

/// Owns the strike state and drives passes until cancelled
pub struct Scheduler {
    api: Arc<dyn ManagerApi>,
    targets: Vec<ManagerTarget>,
    evaluator: StallEvaluator,
    strikes: StrikeTracker,
    poll_interval: Duration,
    metrics: Metrics,
    cancel: CancellationToken,
}

impl Scheduler {
    pub fn new(
        api: Arc<dyn ManagerApi>,
        targets: Vec<ManagerTarget>,
        evaluator: StallEvaluator,
        poll_interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            api,
            targets,
            evaluator,
            strikes: StrikeTracker::new(),
            poll_interval,
            metrics: Metrics::new(),
            cancel,
        }
    }

    pub fn strikes(&self) -> &StrikeTracker {
        &self.strikes
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Main loop; returns once the cancellation token fires
    pub async fn run(&mut self) {
        let names: Vec<&str> = self.targets.iter().map(|t| t.name.as_str()).collect();
        info!(
            managers = ?names,
            poll_interval = %HumanDuration::from(self.poll_interval),
            strike_threshold = self.evaluator.threshold(),
            "Stall sweeper started"
        );

        while !self.cancel.is_cancelled() {
            self.run_cycle().await;

            if self.cancel.is_cancelled() {
                break;
            }

            info!(
                "Finished sweep. Sleeping for {}",
                HumanDuration::from(self.poll_interval)
            );

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        info!("Sweep cancelled, exiting");
    }

    /// One pass over every manager
    pub async fn run_cycle(&mut self) {
        info!("Starting sweep cycle");

        for target in &self.targets {
            if self.cancel.is_cancelled() {
                info!("Cancellation requested, ending cycle early");
                break;
            }

            info!(manager = %target.name, "Checking {} queue...", target.name);

            match run_pass(self.api.as_ref(), &self.evaluator, target, &mut self.strikes).await {
                Ok(summary) => {
                    self.metrics.record_pass(&summary);
                    info!(
                        manager = %target.name,
                        records = summary.records,
                        malformed = summary.malformed,
                        stalled = summary.stalled,
                        evicted = summary.evicted,
                        eviction_failures = summary.eviction_failures,
                        "Finished {} queue", target.name
                    );
                }
                Err(PassError::Cancelled) => {
                    info!(manager = %target.name, "Pass cancelled");
                    break;
                }
                Err(PassError::Fetch(e @ FetchError::MissingRecords)) => {
                    self.metrics.pass_failed();
                    warn!(manager = %target.name, error = %e, "Skipping {} this cycle", target.name);
                }
                Err(e) => {
                    self.metrics.pass_failed();
                    error!(manager = %target.name, error = %e, "Error while processing {} downloads", target.name);
                }
            }
        }

        self.metrics.cycle_completed();
        let snapshot = self.metrics.snapshot();
        info!(
            cycles = snapshot.cycles,
            passes_failed = snapshot.passes_failed,
            records_seen = snapshot.records_seen,
            records_malformed = snapshot.records_malformed,
            strikes_recorded = snapshot.strikes_recorded,
            evictions = snapshot.evictions,
            eviction_failures = snapshot.eviction_failures,
            tracked_downloads = self.strikes.len(),
            "Sweep cycle finished"
        );
    }
}

/// Resolve on Ctrl+C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
