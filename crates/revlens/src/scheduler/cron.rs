//! Cron-expression scheduler on `tokio-cron-scheduler`.
//!
//! Accepts standard five-field expressions (`*/30 * * * *`), the driver's
//! six-field form with leading seconds, and descriptors such as `@hourly`.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::{ScheduledTask, SchedulerError, spawn_firing};

/// Expand a five-field expression to the driver's seconds-first form.
fn normalize(expression: &str) -> String {
    let trimmed = expression.trim();
    if !trimmed.starts_with('@') && trimmed.split_whitespace().count() == 5 {
        format!("0 {trimmed}")
    } else {
        trimmed.to_string()
    }
}

fn build_job(
    schedule: &str,
    task: Arc<dyn ScheduledTask>,
    tracker: TaskTracker,
    cancel: CancellationToken,
) -> Result<Job, SchedulerError> {
    Job::new_async(schedule, move |_id, _scheduler| {
        spawn_firing(&tracker, &cancel, Arc::clone(&task));
        Box::pin(async {})
    })
    .map_err(|e| SchedulerError::InvalidCron {
        expression: schedule.to_string(),
        reason: e.to_string(),
    })
}

struct Running {
    driver: JobScheduler,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

/// Fires a task whenever a cron expression matches.
///
/// The expression is validated in [`CronScheduler::new`].
pub struct CronScheduler {
    task: Arc<dyn ScheduledTask>,
    expression: String,
    schedule: String,
    state: Mutex<Option<Running>>,
}

impl CronScheduler {
    pub fn new(task: Arc<dyn ScheduledTask>, expression: &str) -> Result<Self, SchedulerError> {
        let schedule = normalize(expression);
        if schedule.is_empty() {
            return Err(SchedulerError::InvalidCron {
                expression: expression.to_string(),
                reason: "empty expression".to_string(),
            });
        }
        build_job(
            &schedule,
            Arc::clone(&task),
            TaskTracker::new(),
            CancellationToken::new(),
        )
        .map_err(|e| match e {
            SchedulerError::InvalidCron { reason, .. } => SchedulerError::InvalidCron {
                expression: expression.to_string(),
                reason,
            },
            other => other,
        })?;

        Ok(Self {
            task,
            expression: expression.trim().to_string(),
            schedule,
            state: Mutex::new(None),
        })
    }

    /// The expression as configured.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub async fn is_running(&self) -> bool {
        self.state.lock().await.is_some()
    }

    /// Register the job with a fresh driver and start it.
    ///
    /// Starting a running scheduler logs a warning and does nothing.
    pub async fn start(&self) -> Result<(), SchedulerError> {
        let mut state = self.state.lock().await;
        if state.is_some() {
            tracing::warn!(task = self.task.name(), "Scheduler already running");
            return Ok(());
        }

        let cancel = CancellationToken::new();
        let tracker = TaskTracker::new();
        let job = build_job(
            &self.schedule,
            Arc::clone(&self.task),
            tracker.clone(),
            cancel.clone(),
        )?;

        let mut driver = JobScheduler::new().await.map_err(driver_error)?;
        let job_id = driver.add(job).await.map_err(driver_error)?;
        driver.start().await.map_err(driver_error)?;

        match driver.next_tick_for_job(job_id).await {
            Ok(Some(next)) => tracing::info!(
                task = self.task.name(),
                cron = %self.expression,
                next = %next,
                "Cron scheduler started"
            ),
            Ok(None) => tracing::info!(
                task = self.task.name(),
                cron = %self.expression,
                "Cron scheduler started with no upcoming fire time"
            ),
            Err(e) => tracing::debug!(error = %e, "Could not read next fire time"),
        }

        *state = Some(Running {
            driver,
            cancel,
            tracker,
        });
        Ok(())
    }

    /// Shut the driver down, cancel outstanding firings and wait for them.
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        let Some(mut running) = state.take() else {
            return;
        };

        if let Err(e) = running.driver.shutdown().await {
            tracing::warn!(task = self.task.name(), error = %e, "Cron driver shutdown failed");
        }
        running.cancel.cancel();
        running.tracker.close();
        running.tracker.wait().await;
        tracing::info!(task = self.task.name(), "Cron scheduler stopped");
    }
}

fn driver_error(err: tokio_cron_scheduler::JobSchedulerError) -> SchedulerError {
    SchedulerError::Driver(err.to_string())
}
