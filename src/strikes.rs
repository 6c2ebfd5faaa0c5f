//! Consecutive-stall accounting
//!
//! Strikes live in memory only and are keyed by manager and queue id, so two
//! managers reusing the same numeric id never share a count.

use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StrikeKey {
    pub manager: String,
    pub record_id: i64,
}

impl StrikeKey {
    pub fn new(manager: impl Into<String>, record_id: i64) -> Self {
        Self {
            manager: manager.into(),
            record_id,
        }
    }
}

impl fmt::Display for StrikeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.manager, self.record_id)
    }
}

/// Strike counts per download; an absent key means zero strikes
#[derive(Debug, Default)]
pub struct StrikeTracker {
    counts: HashMap<StrikeKey, u32>,
}

impl StrikeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one more stalled observation and return the new count
    pub fn observe_stall(&mut self, key: &StrikeKey) -> u32 {
        let count = self.counts.entry(key.clone()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    /// Forget `key`; a no-op when it has no strikes
    pub fn clear(&mut self, key: &StrikeKey) {
        self.counts.remove(key);
    }

    pub fn count(&self, key: &StrikeKey) -> u32 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    /// Number of downloads currently carrying strikes
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}
