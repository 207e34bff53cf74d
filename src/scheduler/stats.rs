use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Counters for one scheduled task
#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskStats {
    pub ticks: u64,
    pub failures: u64,
    pub consecutive_failures: u32,
    pub last_tick_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Per-task statistics shared between the scheduler and readers
#[derive(Debug, Clone, Default)]
pub struct SchedulerStats {
    inner: Arc<RwLock<BTreeMap<&'static str, TaskStats>>>,
}

impl SchedulerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&self, name: &'static str) {
        self.inner.write().entry(name).or_default();
    }

    pub(crate) fn record_success(&self, name: &'static str, at: DateTime<Utc>) {
        let mut inner = self.inner.write();
        let stats = inner.entry(name).or_default();
        stats.ticks += 1;
        stats.consecutive_failures = 0;
        stats.last_tick_at = Some(at);
        stats.last_success_at = Some(at);
    }

    pub(crate) fn record_failure(&self, name: &'static str, at: DateTime<Utc>, error: String) {
        let mut inner = self.inner.write();
        let stats = inner.entry(name).or_default();
        stats.ticks += 1;
        stats.failures += 1;
        stats.consecutive_failures += 1;
        stats.last_tick_at = Some(at);
        stats.last_error = Some(error);
    }

    pub fn get(&self, name: &str) -> Option<TaskStats> {
        self.inner.read().get(name).cloned()
    }

    pub fn snapshot(&self) -> BTreeMap<String, TaskStats> {
        self.inner
            .read()
            .iter()
            .map(|(name, stats)| (name.to_string(), stats.clone()))
            .collect()
    }
}
