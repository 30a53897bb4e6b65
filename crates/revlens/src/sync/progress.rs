//! Progress reporting for sync runs.

use chrono::{DateTime, Utc};

use crate::entity::change_status::ChangeStatus;

/// Progress events emitted during a sync run.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum SyncProgress {
    /// Starting to fetch one status.
    StatusStarted {
        status: ChangeStatus,
        since: DateTime<Utc>,
    },

    /// Fetched one page.
    FetchedPage {
        status: ChangeStatus,
        /// Page number (1-indexed).
        page: u32,
        /// Records on the page before branch filtering.
        count: usize,
        /// Records kept from this page.
        matched: usize,
        /// Running total of kept records.
        total_so_far: usize,
    },

    /// Every page of one status was fetched.
    StatusComplete { status: ChangeStatus, total: usize },

    /// One status failed; the run continues with the next one.
    StatusFailed { status: ChangeStatus, error: String },

    /// Changes for one status were written to the store.
    Persisted { status: ChangeStatus, count: u64 },

    /// The cursor for one status moved.
    CursorAdvanced {
        status: ChangeStatus,
        position: DateTime<Utc>,
    },
}

/// Callback for progress updates during sync operations.
pub type ProgressCallback = Box<dyn Fn(SyncProgress) + Send + Sync>;

/// Emit a progress event if a callback is provided.
#[inline]
pub fn emit(on_progress: Option<&ProgressCallback>, event: SyncProgress) {
    if let Some(cb) = on_progress {
        cb(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn emit_with_callback() {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        let callback: ProgressCallback = Box::new(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        emit(
            Some(&callback),
            SyncProgress::StatusComplete {
                status: ChangeStatus::Open,
                total: 3,
            },
        );
        emit(
            Some(&callback),
            SyncProgress::Persisted {
                status: ChangeStatus::Open,
                count: 3,
            },
        );

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn emit_without_callback() {
        emit(
            None,
            SyncProgress::StatusFailed {
                status: ChangeStatus::Merged,
                error: "boom".into(),
            },
        );
    }
}
