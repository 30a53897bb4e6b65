//! Rate-limited paginated fetching for one status.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use super::filter::BranchFilter;
use super::progress::{ProgressCallback, SyncProgress, emit};
use super::types::{PageOptions, SyncOptions};
use crate::change::Change;
use crate::entity::change_status::ChangeStatus;
use crate::gerrit::{ChangeQuery, ChangeSource, GerritError, build_query};
use crate::rate_limit::{ApiRateLimiter, wait_for_rate_limit};

/// Walks the `S` offset of a query until the server runs out of pages,
/// keeping only changes on configured branches.
pub struct PaginatedFetcher {
    source: Arc<dyn ChangeSource>,
    rate_limiter: Option<ApiRateLimiter>,
    project: String,
    exclude_wip: bool,
    branches: BranchFilter,
}

impl PaginatedFetcher {
    pub fn new(
        source: Arc<dyn ChangeSource>,
        rate_limiter: Option<ApiRateLimiter>,
        options: &SyncOptions,
    ) -> Self {
        Self {
            source,
            rate_limiter,
            project: options.project.clone(),
            exclude_wip: options.exclude_wip,
            branches: options.branches.clone(),
        }
    }

    /// Fetch every page of `status` updated after `since`.
    ///
    /// Continuation depends on the raw page size, not on how many changes
    /// survived branch filtering: a page whose every change was filtered
    /// out can still be followed by more. The first error ends the fetch;
    /// nothing is retried here.
    pub async fn fetch_all_for_status(
        &self,
        status: ChangeStatus,
        since: DateTime<Utc>,
        page: &PageOptions,
        cancel: &CancellationToken,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<Vec<Change>, GerritError> {
        let limit = page.limit.max(1);
        let query = ChangeQuery::new(
            build_query(status, since, &self.project, self.exclude_wip),
            limit,
            &page.flags,
        );

        let mut matched = Vec::new();
        let mut start: u32 = 0;
        let mut page_number: u32 = 0;

        loop {
            wait_for_rate_limit(self.rate_limiter.as_ref(), cancel).await?;

            let changes = self.source.query_changes(&query.at(start), cancel).await?;
            page_number += 1;
            let count = changes.len();
            if count == 0 {
                break;
            }

            let before = matched.len();
            matched.extend(
                changes
                    .into_iter()
                    .filter(|change| self.branches.matches(&change.branch)),
            );

            tracing::debug!(
                status = %status,
                page = page_number,
                count,
                matched = matched.len() - before,
                "Fetched page"
            );
            emit(
                on_progress,
                SyncProgress::FetchedPage {
                    status,
                    page: page_number,
                    count,
                    matched: matched.len() - before,
                    total_so_far: matched.len(),
                },
            );

            if count < limit as usize {
                break;
            }
            start = start.saturating_add(count as u32);
        }

        Ok(matched)
    }
}
