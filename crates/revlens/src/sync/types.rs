//! Sync options, page options and run reports.

use chrono::{DateTime, Duration, Utc};

use super::filter::BranchFilter;
use crate::entity::change_status::ChangeStatus;
use crate::gerrit::query::{DetailFlag, FULL_DETAIL, LIGHT_DETAIL};

/// Page size for full-detail syncs.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Page size for light polling.
pub const DEFAULT_LIGHT_PAGE_SIZE: u32 = 25;

/// How far back the first sync of a status reaches.
pub const DEFAULT_INITIAL_LOOKBACK_DAYS: i64 = 30;

/// Page size and detail flags for one fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageOptions {
    pub limit: u32,
    pub flags: Vec<DetailFlag>,
}

impl PageOptions {
    #[must_use]
    pub fn full(limit: u32) -> Self {
        Self {
            limit: limit.max(1),
            flags: FULL_DETAIL.to_vec(),
        }
    }

    #[must_use]
    pub fn light(limit: u32) -> Self {
        Self {
            limit: limit.max(1),
            flags: LIGHT_DETAIL.to_vec(),
        }
    }
}

/// Options for a sync run.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Project to query; empty means every visible project.
    pub project: String,
    /// Statuses visited, in order.
    pub statuses: Vec<ChangeStatus>,
    pub branches: BranchFilter,
    pub page_size: u32,
    pub light_page_size: u32,
    pub exclude_wip: bool,
    /// Lookback used when a status has no cursor yet.
    pub initial_lookback: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            project: String::new(),
            statuses: ChangeStatus::ALL.to_vec(),
            branches: BranchFilter::default(),
            page_size: DEFAULT_PAGE_SIZE,
            light_page_size: DEFAULT_LIGHT_PAGE_SIZE,
            exclude_wip: true,
            initial_lookback: Duration::days(DEFAULT_INITIAL_LOOKBACK_DAYS),
        }
    }
}

impl SyncOptions {
    #[must_use]
    pub fn full_page(&self) -> PageOptions {
        PageOptions::full(self.page_size)
    }

    #[must_use]
    pub fn light_page(&self) -> PageOptions {
        PageOptions::light(self.light_page_size)
    }
}

/// Outcome of one status within an incremental run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub status: ChangeStatus,
    /// Changes kept after branch filtering.
    pub fetched: usize,
    /// Rows written by the store.
    pub upserted: u64,
    /// Cursor position after the run.
    pub cursor: DateTime<Utc>,
}

/// Result of [`SyncEngine::sync_incremental`](super::SyncEngine::sync_incremental).
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub statuses: Vec<StatusReport>,
    /// Statuses that failed, with their error message.
    pub failed: Vec<(ChangeStatus, String)>,
}

impl SyncReport {
    #[must_use]
    pub fn fetched(&self) -> usize {
        self.statuses.iter().map(|s| s.fetched).sum()
    }

    #[must_use]
    pub fn upserted(&self) -> u64 {
        self.statuses.iter().map(|s| s.upserted).sum()
    }

    /// At least one status succeeded and at least one failed.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        !self.failed.is_empty()
    }
}
