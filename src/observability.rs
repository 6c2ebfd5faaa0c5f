//! Logging setup and sweep counters

use crate::config::LoggingConfig;
use crate::evaluator::PassSummary;
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Failed to open log file {path}: {source}")]
    LogFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to install tracing subscriber: {0}")]
    Init(#[from] TryInitError),
}

/// Stdout-only subscriber for the current thread, used until the
/// configured one is installed
///
/// Keeps config-loading diagnostics visible; drop the guard before calling
/// [`init_tracing`].
pub fn bootstrap_tracing() -> DefaultGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).finish().set_default()
}

/// Install the global subscriber
///
/// Always logs to stdout; additionally appends to `<directory>/<file_name>`
/// when a directory is configured. `RUST_LOG` overrides the configured level.
/// Returns the log file path, if any.
pub fn init_tracing(config: &LoggingConfig) -> Result<Option<PathBuf>, LoggingError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let (file_layer, log_path) = match &config.directory {
        Some(directory) => {
            let path = directory.join(&config.file_name);
            let file = fs::create_dir_all(directory)
                .and_then(|_| OpenOptions::new().create(true).append(true).open(&path))
                .map_err(|source| LoggingError::LogFile {
                    path: path.clone(),
                    source,
                })?;

            let layer = fmt::layer().with_ansi(false).with_writer(Mutex::new(file));
            (Some(layer), Some(path))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .try_init()?;

    Ok(log_path)
}

/// Process-lifetime counters, logged at the end of every cycle
#[derive(Debug, Default)]
pub struct Metrics {
    cycles: AtomicU64,
    passes_failed: AtomicU64,
    records_seen: AtomicU64,
    records_malformed: AtomicU64,
    strikes_recorded: AtomicU64,
    evictions: AtomicU64,
    eviction_failures: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cycle_completed(&self) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "cycles", "Metric incremented");
    }

    pub fn pass_failed(&self) {
        self.passes_failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "passes_failed", "Metric incremented");
    }

    pub fn record_pass(&self, summary: &PassSummary) {
        self.records_seen.fetch_add(summary.records as u64, Ordering::Relaxed);
        self.records_malformed.fetch_add(summary.malformed as u64, Ordering::Relaxed);
        self.strikes_recorded.fetch_add(summary.stalled as u64, Ordering::Relaxed);
        self.evictions.fetch_add(summary.evicted as u64, Ordering::Relaxed);
        self.eviction_failures.fetch_add(summary.eviction_failures as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            passes_failed: self.passes_failed.load(Ordering::Relaxed),
            records_seen: self.records_seen.load(Ordering::Relaxed),
            records_malformed: self.records_malformed.load(Ordering::Relaxed),
            strikes_recorded: self.strikes_recorded.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            eviction_failures: self.eviction_failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub cycles: u64,
    pub passes_failed: u64,
    pub records_seen: u64,
    pub records_malformed: u64,
    pub strikes_recorded: u64,
    pub evictions: u64,
    pub eviction_failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_tracing_creates_log_file() {
        let temp_dir = TempDir::new().unwrap();
        let directory = temp_dir.path().join("logs");
        let config = LoggingConfig {
            directory: Some(directory.clone()),
            file_name: "sweep.log".to_string(),
            level: "info".to_string(),
        };

        // The global subscriber can only be installed once per process
        match init_tracing(&config) {
            Ok(path) => assert_eq!(path, Some(directory.join("sweep.log"))),
            Err(e) => assert!(matches!(e, LoggingError::Init(_))),
        }

        assert!(directory.is_dir());
        assert!(directory.join("sweep.log").is_file());
    }

    #[test]
    fn test_unwritable_log_directory_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();
        let config = LoggingConfig {
            directory: Some(blocker.join("logs")),
            ..LoggingConfig::default()
        };

        let result = init_tracing(&config);
        assert!(matches!(result, Err(LoggingError::LogFile { .. })));
    }

    #[test]
    fn test_record_pass_accumulates() {
        let metrics = Metrics::new();
        let summary = PassSummary {
            records: 4,
            malformed: 1,
            stalled: 2,
            evicted: 1,
            eviction_failures: 1,
        };

        metrics.record_pass(&summary);
        metrics.record_pass(&summary);
        metrics.cycle_completed();
        metrics.pass_failed();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.records_seen, 8);
        assert_eq!(snapshot.records_malformed, 2);
        assert_eq!(snapshot.strikes_recorded, 4);
        assert_eq!(snapshot.evictions, 2);
        assert_eq!(snapshot.eviction_failures, 2);
        assert_eq!(snapshot.cycles, 1);
        assert_eq!(snapshot.passes_failed, 1);
    }
}
