//! Fixed-interval driver for the evaluation engines
//!
//! Each registered task gets its own loop: run one tick to completion, then
//! sleep for the task's interval (or the failure backoff if the tick failed).
//! A tick never overlaps another tick of the same task.

pub mod stats;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::repository::RepositoryError;

pub use stats::{SchedulerStats, TaskStats};

/// Work run on every tick of a scheduled task
#[async_trait]
pub trait PeriodicTask: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn tick(&self, now: DateTime<Utc>) -> Result<(), TickError>;
}

/// Failure that aborts a whole tick
#[derive(Debug, thiserror::Error)]
pub enum TickError {
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Tick panicked: {0}")]
    Panicked(String),
}

/// Timing for one scheduled task
#[derive(Debug, Clone, Copy)]
pub struct Schedule {
    pub interval: Duration,
    pub failure_backoff: Duration,
}

/// Runs periodic tasks until shut down
pub struct Scheduler {
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
    stats: SchedulerStats,
}

impl Scheduler {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            shutdown_tx,
            handles: Vec::new(),
            stats: SchedulerStats::new(),
        }
    }

    /// Shared view of per-task statistics
    pub fn stats(&self) -> SchedulerStats {
        self.stats.clone()
    }

    /// Start running `task` on `schedule`. The first tick fires immediately.
    pub fn spawn(&mut self, task: Arc<dyn PeriodicTask>, schedule: Schedule) {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let stats = self.stats.clone();
        let name = task.name();
        stats.register(name);

        let handle = tokio::spawn(async move {
            tracing::info!(
                task = name,
                "Task started with interval {:?}, failure backoff {:?}",
                schedule.interval,
                schedule.failure_backoff
            );

            loop {
                let stopping = *shutdown_rx.borrow();
                if stopping {
                    break;
                }

                let result = AssertUnwindSafe(task.tick(Utc::now()))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| {
                        Err(TickError::Panicked(panic_message(panic.as_ref())))
                    });

                let delay = match result {
                    Ok(()) => {
                        stats.record_success(name, Utc::now());
                        schedule.interval
                    }
                    Err(e) => {
                        tracing::error!(
                            task = name,
                            error = %e,
                            "Tick failed, retrying in {:?}",
                            schedule.failure_backoff
                        );
                        stats.record_failure(name, Utc::now(), e.to_string());
                        schedule.failure_backoff
                    }
                };

                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }

            tracing::info!(task = name, "Task stopped");
        });

        self.handles.push(handle);
    }

    /// Stop scheduling new ticks and wait for in-flight ticks to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Scheduled task panicked");
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
