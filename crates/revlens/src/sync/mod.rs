//! Incremental change synchronization.
//!
//! - [`filter`] - local branch patterns
//! - [`fetch`] - `PaginatedFetcher`, rate-limited offset pagination
//! - [`engine`] - `SyncEngine`, multi-status runs and cursors
//! - [`progress`] - `SyncProgress`, `ProgressCallback`, `emit()`

pub mod engine;
pub mod fetch;
pub mod filter;
mod progress;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use engine::{SyncEngine, SyncError};
pub use fetch::PaginatedFetcher;
pub use filter::{BranchFilter, BranchPattern};
pub use progress::{ProgressCallback, SyncProgress, emit};
pub use types::{
    DEFAULT_INITIAL_LOOKBACK_DAYS, DEFAULT_LIGHT_PAGE_SIZE, DEFAULT_PAGE_SIZE, PageOptions,
    StatusReport, SyncOptions, SyncReport,
};
