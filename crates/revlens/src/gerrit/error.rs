//! Error types for review-server API operations.

use thiserror::Error;

use crate::http::HttpError;

/// Errors that can occur when talking to the review server.
#[derive(Debug, Error)]
pub enum GerritError {
    /// Transport-level failure.
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    /// Response body was not the expected JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// API returned a non-success status.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The caller's cancellation fired.
    #[error("request cancelled")]
    Cancelled,

    /// Invalid configuration (bad base URL, ...).
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl GerritError {
    /// True when the server could not be reached at all.
    #[must_use]
    pub fn is_connection(&self) -> bool {
        matches!(self, GerritError::Http(e) if e.is_connection())
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, GerritError::Cancelled)
    }

    /// Build an `Api` error from a response body.
    pub(crate) fn api(status: u16, body: &str) -> Self {
        GerritError::Api {
            status,
            message: body.trim().to_string(),
        }
    }
}

impl From<crate::rate_limit::Cancelled> for GerritError {
    fn from(_: crate::rate_limit::Cancelled) -> Self {
        GerritError::Cancelled
    }
}

/// Get a short error message suitable for display.
pub fn short_error_message(err: &GerritError) -> String {
    match err {
        GerritError::Http(HttpError::Connect(_)) => "Connection refused".to_string(),
        GerritError::Http(HttpError::Timeout(_)) => "Timed out".to_string(),
        GerritError::Http(_) => "Network error".to_string(),
        GerritError::Json(_) => "JSON parse error".to_string(),
        GerritError::Api { status, message } => {
            if message.chars().count() > 50 {
                let truncated: String = message.chars().take(47).collect();
                format!("HTTP {}: {}...", status, truncated)
            } else {
                format!("HTTP {}: {}", status, message)
            }
        }
        GerritError::Cancelled => "Cancelled".to_string(),
        GerritError::Config(msg) => format!("Config: {}", msg),
    }
}
