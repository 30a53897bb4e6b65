//! Periodic execution of sync and analysis work.
//!
//! - [`interval`] - `IntervalScheduler`, fires now and then every period
//! - [`cron`] - `CronScheduler`, fires on a cron expression
//!
//! Both schedulers spawn each firing as its own tracked task with a child
//! cancellation token. `stop` cancels outstanding firings and waits for
//! them to finish.

pub mod cron;
pub mod interval;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

pub use self::cron::CronScheduler;
pub use self::interval::IntervalScheduler;

/// Default period between sync runs.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Default analysis schedule.
pub const DEFAULT_ANALYSIS_CRON: &str = "*/30 * * * *";

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("invalid cron expression {expression:?}: {reason}")]
    InvalidCron { expression: String, reason: String },

    #[error("interval must be greater than zero")]
    ZeroInterval,

    #[error("scheduler driver error: {0}")]
    Driver(String),
}

/// Outcome of one firing that did not succeed.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("cancelled")]
    Cancelled,

    #[error(transparent)]
    Failed(Box<dyn std::error::Error + Send + Sync>),
}

impl TaskError {
    pub fn failed(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        TaskError::Failed(err.into())
    }
}

/// A unit of work a scheduler can fire.
#[async_trait]
pub trait ScheduledTask: Send + Sync {
    /// Name used in log lines.
    fn name(&self) -> &str;

    async fn run(&self, cancel: CancellationToken) -> Result<(), TaskError>;
}

/// Schedule settings for the long-running mode.
#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    pub enabled: bool,
    pub sync_interval: Duration,
    pub analysis_cron: String,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            sync_interval: DEFAULT_SYNC_INTERVAL,
            analysis_cron: DEFAULT_ANALYSIS_CRON.to_string(),
        }
    }
}

/// Run one firing of `task` on `tracker` under a child of `parent`.
pub(crate) fn spawn_firing(
    tracker: &TaskTracker,
    parent: &CancellationToken,
    task: Arc<dyn ScheduledTask>,
) {
    let cancel = parent.child_token();
    tracker.spawn(async move {
        let started = Instant::now();
        tracing::debug!(task = task.name(), "Task firing");
        match task.run(cancel).await {
            Ok(()) => tracing::info!(
                task = task.name(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Task complete"
            ),
            Err(TaskError::Cancelled) => tracing::info!(task = task.name(), "Task cancelled"),
            Err(e) => tracing::warn!(task = task.name(), error = %e, "Task failed"),
        }
    });
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Counts firings; optionally blocks until cancelled.
    #[derive(Default)]
    pub(crate) struct CountingTask {
        pub started: AtomicUsize,
        pub cancelled: AtomicUsize,
        pub block_until_cancelled: bool,
    }

    impl CountingTask {
        pub fn blocking() -> Self {
            Self {
                block_until_cancelled: true,
                ..Self::default()
            }
        }

        pub fn started(&self) -> usize {
            self.started.load(Ordering::SeqCst)
        }

        pub fn cancelled(&self) -> usize {
            self.cancelled.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ScheduledTask for CountingTask {
        fn name(&self) -> &str {
            "counting"
        }

        async fn run(&self, cancel: CancellationToken) -> Result<(), TaskError> {
            self.started.fetch_add(1, Ordering::SeqCst);
            if self.block_until_cancelled {
                cancel.cancelled().await;
                self.cancelled.fetch_add(1, Ordering::SeqCst);
                return Err(TaskError::Cancelled);
            }
            Ok(())
        }
    }
}
