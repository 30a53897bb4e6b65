//! Multi-status sync orchestration.
//!
//! Statuses are fetched one after another. A failing status is logged and
//! skipped; cancellation aborts the whole run. The run only fails when no
//! status succeeded.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::fetch::PaginatedFetcher;
use super::progress::{ProgressCallback, SyncProgress, emit};
use super::types::{PageOptions, StatusReport, SyncOptions, SyncReport};
use crate::change::Change;
use crate::entity::change_status::ChangeStatus;
use crate::gerrit::{ChangeSource, GerritError};
use crate::rate_limit::ApiRateLimiter;
use crate::store::{Store, StoreError};

/// Errors from a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("sync cancelled")]
    Cancelled,

    #[error("fetching {status} changes failed: {source}")]
    Fetch {
        status: ChangeStatus,
        #[source]
        source: GerritError,
    },

    #[error("persisting {status} changes failed: {source}")]
    Store {
        status: ChangeStatus,
        #[source]
        source: StoreError,
    },
}

impl SyncError {
    fn fetch(status: ChangeStatus, source: GerritError) -> Self {
        if source.is_cancelled() {
            SyncError::Cancelled
        } else {
            SyncError::Fetch { status, source }
        }
    }

    fn store(status: ChangeStatus, source: StoreError) -> Self {
        SyncError::Store { status, source }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SyncError::Cancelled)
    }

    /// The review server could not be reached at all.
    #[must_use]
    pub fn is_connection(&self) -> bool {
        matches!(self, SyncError::Fetch { source, .. } if source.is_connection())
    }
}

/// Partial-failure bookkeeping across the statuses of one run.
#[derive(Default)]
struct StatusOutcomes {
    succeeded: usize,
    failed: Vec<(ChangeStatus, String)>,
    last_error: Option<SyncError>,
}

impl StatusOutcomes {
    fn success(&mut self) {
        self.succeeded += 1;
    }

    /// Record a failed status; cancellation is handed straight back.
    fn failure(
        &mut self,
        status: ChangeStatus,
        error: SyncError,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<(), SyncError> {
        if error.is_cancelled() {
            return Err(error);
        }
        tracing::warn!(status = %status, error = %error, "Status sync failed, continuing");
        emit(
            on_progress,
            SyncProgress::StatusFailed {
                status,
                error: error.to_string(),
            },
        );
        self.failed.push((status, error.to_string()));
        self.last_error = Some(error);
        Ok(())
    }

    /// The failed statuses, or the last error when nothing succeeded.
    fn finish(self) -> Result<Vec<(ChangeStatus, String)>, SyncError> {
        match self.last_error {
            Some(error) if self.succeeded == 0 => Err(error),
            _ => Ok(self.failed),
        }
    }
}

/// Drives [`PaginatedFetcher`] across every configured status.
///
/// # Example
///
/// ```ignore
/// let engine = SyncEngine::new(Arc::new(client), Some(limiter), options);
/// let report = engine.sync_incremental(&store, &cancel).await?;
/// println!("{} changes upserted", report.upserted());
/// ```
pub struct SyncEngine {
    fetcher: PaginatedFetcher,
    options: SyncOptions,
    on_progress: Option<ProgressCallback>,
}

impl SyncEngine {
    pub fn new(
        source: Arc<dyn ChangeSource>,
        rate_limiter: Option<ApiRateLimiter>,
        options: SyncOptions,
    ) -> Self {
        Self {
            fetcher: PaginatedFetcher::new(source, rate_limiter, &options),
            options,
            on_progress: None,
        }
    }

    #[must_use]
    pub fn with_progress(mut self, on_progress: ProgressCallback) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Fetch every status updated after `since` with full detail.
    #[tracing::instrument(skip(self, cancel), fields(project = %self.options.project))]
    pub async fn sync_since(
        &self,
        since: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Change>, SyncError> {
        self.sync_with(since, &self.options.full_page(), cancel)
            .await
    }

    /// Like [`sync_since`](Self::sync_since) with smaller pages and only
    /// labels and accounts, for fast polling.
    #[tracing::instrument(skip(self, cancel), fields(project = %self.options.project))]
    pub async fn sync_since_light(
        &self,
        since: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Change>, SyncError> {
        self.sync_with(since, &self.options.light_page(), cancel)
            .await
    }

    async fn sync_with(
        &self,
        since: DateTime<Utc>,
        page: &PageOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<Change>, SyncError> {
        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        let on_progress = self.on_progress.as_ref();
        let mut outcomes = StatusOutcomes::default();
        let mut changes = Vec::new();

        for &status in &self.options.statuses {
            match self.fetch_status(status, since, page, cancel).await {
                Ok(fetched) => {
                    outcomes.success();
                    changes.extend(fetched);
                }
                Err(error) => outcomes.failure(status, error, on_progress)?,
            }
        }

        outcomes.finish()?;
        Ok(changes)
    }

    /// Fetch one status.
    pub async fn fetch_status(
        &self,
        status: ChangeStatus,
        since: DateTime<Utc>,
        page: &PageOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<Change>, SyncError> {
        let on_progress = self.on_progress.as_ref();
        emit(on_progress, SyncProgress::StatusStarted { status, since });

        let changes = self
            .fetcher
            .fetch_all_for_status(status, since, page, cancel, on_progress)
            .await
            .map_err(|e| SyncError::fetch(status, e))?;

        tracing::info!(status = %status, count = changes.len(), "Fetched changes");
        emit(
            on_progress,
            SyncProgress::StatusComplete {
                status,
                total: changes.len(),
            },
        );
        Ok(changes)
    }

    /// Cursor-driven sync into `store`.
    ///
    /// Each status resumes from its stored cursor (or the initial lookback),
    /// and its cursor moves to the time the fetch started only once every
    /// page was fetched and persisted.
    #[tracing::instrument(skip_all, fields(project = %self.options.project))]
    pub async fn sync_incremental(
        &self,
        store: &dyn Store,
        cancel: &CancellationToken,
    ) -> Result<SyncReport, SyncError> {
        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        let on_progress = self.on_progress.as_ref();
        let page = self.options.full_page();
        let mut outcomes = StatusOutcomes::default();
        let mut report = SyncReport::default();

        for &status in &self.options.statuses {
            if cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }
            match self.sync_status(store, status, &page, cancel).await {
                Ok(status_report) => {
                    outcomes.success();
                    report.statuses.push(status_report);
                }
                Err(error) => outcomes.failure(status, error, on_progress)?,
            }
        }

        report.failed = outcomes.finish()?;
        tracing::info!(
            fetched = report.fetched(),
            upserted = report.upserted(),
            failed = report.failed.len(),
            "Sync complete"
        );
        Ok(report)
    }

    async fn sync_status(
        &self,
        store: &dyn Store,
        status: ChangeStatus,
        page: &PageOptions,
        cancel: &CancellationToken,
    ) -> Result<StatusReport, SyncError> {
        let project = self.options.project.as_str();
        let started = Utc::now();
        let since = store
            .cursor(project, status)
            .await
            .map_err(|e| SyncError::store(status, e))?
            .unwrap_or(started - self.options.initial_lookback);

        let changes = self.fetch_status(status, since, page, cancel).await?;

        let upserted = store
            .upsert_changes(&changes)
            .await
            .map_err(|e| SyncError::store(status, e))?;
        emit(
            self.on_progress.as_ref(),
            SyncProgress::Persisted {
                status,
                count: upserted,
            },
        );

        let cursor = store
            .advance_cursor(project, status, started)
            .await
            .map_err(|e| SyncError::store(status, e))?;
        tracing::debug!(status = %status, cursor = %cursor, "Cursor advanced");
        emit(
            self.on_progress.as_ref(),
            SyncProgress::CursorAdvanced {
                status,
                position: cursor,
            },
        );

        Ok(StatusReport {
            status,
            fetched: changes.len(),
            upserted,
            cursor,
        })
    }
}
