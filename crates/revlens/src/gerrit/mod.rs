//! Review-server (Gerrit REST) integration.
//!
//! - [`client`] - `GerritClient`, the HTTP client for `/changes/`
//! - [`query`] - query expressions, page requests and detail flags
//! - [`types`] - wire types
//! - [`convert`] - wire to domain conversion

pub mod client;
pub mod convert;
pub mod error;
pub mod query;
pub mod types;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::change::Change;

pub use client::{Credentials, GerritClient};
pub use error::{GerritError, short_error_message};
pub use query::{ChangeQuery, DetailFlag, FULL_DETAIL, LIGHT_DETAIL, build_query};

/// Anti-XSSI prefix the server puts in front of every JSON body.
pub const XSSI_PREFIX: &[u8] = b")]}'";

/// Strip [`XSSI_PREFIX`] and the newline after it, if present.
#[must_use]
pub fn strip_xssi_prefix(body: &[u8]) -> &[u8] {
    match body.strip_prefix(XSSI_PREFIX) {
        Some(rest) => rest
            .strip_prefix(b"\r\n")
            .or_else(|| rest.strip_prefix(b"\n"))
            .unwrap_or(rest),
        None => body,
    }
}

/// Anything that can answer a paged change query.
///
/// Implemented by [`GerritClient`]; the sync engine only depends on this.
#[async_trait]
pub trait ChangeSource: Send + Sync {
    async fn query_changes(
        &self,
        query: &ChangeQuery,
        cancel: &CancellationToken,
    ) -> Result<Vec<Change>, GerritError>;
}
