//! Fixed-period scheduler.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::{ScheduledTask, SchedulerError, spawn_firing};

struct Running {
    cancel: CancellationToken,
    tracker: TaskTracker,
    ticker: JoinHandle<()>,
}

/// Fires a task immediately on start and then once per period.
///
/// A firing that is still running when the next tick arrives does not
/// delay it; firings may overlap.
pub struct IntervalScheduler {
    task: Arc<dyn ScheduledTask>,
    every: Duration,
    enabled: bool,
    state: Mutex<Option<Running>>,
}

impl IntervalScheduler {
    pub fn new(
        task: Arc<dyn ScheduledTask>,
        every: Duration,
        enabled: bool,
    ) -> Result<Self, SchedulerError> {
        if every.is_zero() {
            return Err(SchedulerError::ZeroInterval);
        }
        Ok(Self {
            task,
            every,
            enabled,
            state: Mutex::new(None),
        })
    }

    pub fn period(&self) -> Duration {
        self.every
    }

    pub async fn is_running(&self) -> bool {
        self.state.lock().await.is_some()
    }

    pub async fn start(&self) {
        let mut state = self.state.lock().await;
        if !self.enabled {
            tracing::info!(task = self.task.name(), "Scheduler disabled, not starting");
            return;
        }
        if state.is_some() {
            tracing::warn!(task = self.task.name(), "Scheduler already running");
            return;
        }

        let cancel = CancellationToken::new();
        let tracker = TaskTracker::new();
        let ticker = tokio::spawn(tick_loop(
            Arc::clone(&self.task),
            self.every,
            cancel.clone(),
            tracker.clone(),
        ));
        tracing::info!(
            task = self.task.name(),
            every_secs = self.every.as_secs(),
            "Interval scheduler started"
        );
        *state = Some(Running {
            cancel,
            tracker,
            ticker,
        });
    }

    /// Cancel outstanding firings and wait for them to finish.
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        let Some(running) = state.take() else {
            return;
        };

        running.cancel.cancel();
        if let Err(e) = running.ticker.await {
            tracing::warn!(task = self.task.name(), error = %e, "Ticker task ended abnormally");
        }
        running.tracker.close();
        running.tracker.wait().await;
        tracing::info!(task = self.task.name(), "Interval scheduler stopped");
    }
}

async fn tick_loop(
    task: Arc<dyn ScheduledTask>,
    every: Duration,
    cancel: CancellationToken,
    tracker: TaskTracker,
) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => spawn_firing(&tracker, &cancel, Arc::clone(&task)),
        }
    }
}
