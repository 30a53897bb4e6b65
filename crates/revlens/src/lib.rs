//! revlens - incremental code-review sync and local-model analysis.
//!
//! This library mirrors changes from a review server into a local store,
//! tracking one cursor per (project, status), and analyzes them with a
//! locally hosted generative model.
//!
//! # Features
//!
//! - `sqlite` - SQLite driver for [`store::DbStore`] (default)
//! - `migrate` - Enables database migration support. When enabled, you can use
//!   [`connect_and_migrate`] to create the schema on connection.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use revlens::{connect_and_migrate, GerritClient, SyncEngine, SyncOptions};
//! use revlens::store::DbStore;
//!
//! let db = connect_and_migrate("sqlite://revlens.db?mode=rwc").await?;
//! let store = DbStore::new(db);
//! let client = GerritClient::new("https://review.example.org", None)?;
//! let engine = SyncEngine::new(Arc::new(client), None, SyncOptions::default());
//!
//! let report = engine.sync_incremental(&store, &cancel).await?;
//! println!("{} changes upserted", report.upserted());
//! ```

pub mod analysis;
pub mod change;
pub mod db;
pub mod entity;
pub mod gerrit;
pub mod gitiles;
pub mod http;
pub mod jobs;
pub mod rate_limit;
pub mod retry;
pub mod scheduler;
pub mod store;
pub mod sync;

#[cfg(feature = "migrate")]
pub mod migration;

pub use analysis::{
    AnalysisError, AnalysisPipeline, Analyzer, AnalyzerOptions, GenerateError, GenerativeClient,
    Generator,
};
pub use change::{AnalysisResult, Change};
pub use db::connect;
#[cfg(feature = "migrate")]
pub use db::connect_and_migrate;
pub use entity::prelude::*;
pub use gerrit::{ChangeSource, Credentials, GerritClient, GerritError};
pub use gitiles::{GitilesClient, GitilesError};
pub use rate_limit::{ApiRateLimiter, rate_limits};
pub use retry::{RetryError, RetryPolicy};
pub use scheduler::{CronScheduler, IntervalScheduler, ScheduledTask, SchedulerOptions};
pub use store::{DbStore, MemoryStore, Store, StoreError};
pub use sync::{SyncEngine, SyncError, SyncOptions, SyncProgress, SyncReport};
