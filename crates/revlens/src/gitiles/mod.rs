//! Commit and log browsing (Gitiles JSON API).

pub mod client;
pub mod types;

use thiserror::Error;

use crate::http::HttpError;

pub use client::GitilesClient;
pub use types::{GitilesCommit, GitilesLog, GitilesPerson, TreeDiffEntry};

/// Errors that can occur when browsing commits.
#[derive(Debug, Error)]
pub enum GitilesError {
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// A `format=TEXT` body was not valid base64 or UTF-8.
    #[error("could not decode response: {0}")]
    Decode(String),

    #[error("request cancelled")]
    Cancelled,

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl GitilesError {
    #[must_use]
    pub fn is_connection(&self) -> bool {
        matches!(self, GitilesError::Http(e) if e.is_connection())
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, GitilesError::Cancelled)
    }
}

impl From<crate::rate_limit::Cancelled> for GitilesError {
    fn from(_: crate::rate_limit::Cancelled) -> Self {
        GitilesError::Cancelled
    }
}
