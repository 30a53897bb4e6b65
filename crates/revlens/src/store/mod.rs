//! Persistence for changes, sync cursors and analysis results.
//!
//! - [`DbStore`] - sea-orm backed store used by the CLI
//! - [`MemoryStore`] - in-process store for embedding and tests
//!
//! Both honour the same contract: a stored change never moves to an older
//! `updated`, cursors only move forward, and each change has at most one
//! analysis result.

mod database;
mod memory;

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::DbErr;
use thiserror::Error;

use crate::change::{AnalysisResult, Change};
use crate::entity::change_status::ChangeStatus;

pub use database::DbStore;
pub use memory::MemoryStore;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] DbErr),

    #[error("change not found: {0}")]
    ChangeNotFound(String),

    #[error("invalid stored data: {0}")]
    InvalidData(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Read/write contract the sync engine and analysis pipeline rely on.
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert or update changes by (project, change number).
    ///
    /// Observations older than the stored row are ignored; summary-only
    /// observations keep stored detail. Returns the number of rows written.
    async fn upsert_changes(&self, changes: &[Change]) -> Result<u64>;

    async fn cursor(&self, project: &str, status: ChangeStatus) -> Result<Option<DateTime<Utc>>>;

    /// Move the cursor to `max(current, to)` and return the new position.
    async fn advance_cursor(
        &self,
        project: &str,
        status: ChangeStatus,
        to: DateTime<Utc>,
    ) -> Result<DateTime<Utc>>;

    /// Changes with no analysis, or whose analysis predates their last
    /// update; oldest update first.
    async fn select_unanalyzed(&self, limit: u64) -> Result<Vec<Change>>;

    /// Insert or replace the analysis of one stored change.
    async fn upsert_analysis(&self, result: &AnalysisResult) -> Result<()>;

    async fn find_change(&self, project: &str, change_number: i64) -> Result<Option<Change>>;

    async fn find_analysis(
        &self,
        project: &str,
        change_number: i64,
    ) -> Result<Option<AnalysisResult>>;

    /// The owner's most recently updated changes, newest first.
    async fn recent_changes(&self, owner_name: &str, limit: u64) -> Result<Vec<Change>>;
}

/// Collapse repeated observations of one change to the newest.
///
/// Pages can overlap when the server reorders between requests.
pub(crate) fn newest_per_change(changes: &[Change]) -> Vec<&Change> {
    let mut index: HashMap<(&str, i64), usize> = HashMap::with_capacity(changes.len());
    let mut newest: Vec<&Change> = Vec::with_capacity(changes.len());
    for change in changes {
        match index.entry((change.project.as_str(), change.change_number)) {
            Entry::Occupied(entry) => {
                let slot = &mut newest[*entry.get()];
                if slot.updated <= change.updated {
                    *slot = change;
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(newest.len());
                newest.push(change);
            }
        }
    }
    newest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::fixtures::change;

    #[test]
    fn newest_observation_wins() {
        let old = change(1, "main", ChangeStatus::Open, 1);
        let new = change(1, "main", ChangeStatus::Merged, 5);
        let other = change(2, "main", ChangeStatus::Open, 3);

        let batch = [old.clone(), other.clone(), new.clone(), old];
        let kept = newest_per_change(&batch);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].status, ChangeStatus::Merged);
        assert_eq!(kept[1].change_number, 2);
    }
}
