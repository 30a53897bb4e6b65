//! Gitiles client: commit metadata, history and patches.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use base64::Engine;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use super::GitilesError;
use super::types::{GitilesCommit, GitilesLog};
use crate::gerrit::strip_xssi_prefix;
use crate::http::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
use crate::rate_limit::{ApiRateLimiter, wait_for_rate_limit};

const REQUEST_TIMEOUT: StdDuration = StdDuration::from_secs(60);

/// Gitiles client with an optional shared rate limiter.
#[derive(Clone)]
pub struct GitilesClient {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    rate_limiter: Option<ApiRateLimiter>,
}

impl GitilesClient {
    pub fn new(base_url: &str, rate_limiter: Option<ApiRateLimiter>) -> Result<Self, GitilesError> {
        let transport = ReqwestTransport::with_timeout(REQUEST_TIMEOUT)
            .map_err(|e| GitilesError::Config(e.to_string()))?;
        Ok(Self::new_with_transport(
            base_url,
            rate_limiter,
            Arc::new(transport),
        ))
    }

    pub fn new_with_transport(
        base_url: &str,
        rate_limiter: Option<ApiRateLimiter>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
            rate_limiter,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn log_url(&self, project: &str, reference: &str, limit: u32) -> String {
        format!(
            "{}/{}/+log/{}?format=JSON&n={}",
            self.base_url,
            project.trim_matches('/'),
            reference,
            limit
        )
    }

    pub(crate) fn commit_url(&self, project: &str, commit: &str) -> String {
        format!(
            "{}/{}/+/{}?format=JSON",
            self.base_url,
            project.trim_matches('/'),
            commit
        )
    }

    pub(crate) fn patch_url(&self, project: &str, commit: &str) -> String {
        format!(
            "{}/{}/+/{}%5E%21/?format=TEXT",
            self.base_url,
            project.trim_matches('/'),
            commit
        )
    }

    async fn send(
        &self,
        url: String,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse, GitilesError> {
        wait_for_rate_limit(self.rate_limiter.as_ref(), cancel).await?;

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(GitilesError::Cancelled),
            response = self.transport.send(HttpRequest::get(url)) => response?,
        };

        if !response.is_success() {
            return Err(GitilesError::Api {
                status: response.status,
                message: response.body_text().trim().to_string(),
            });
        }
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: String,
        cancel: &CancellationToken,
    ) -> Result<T, GitilesError> {
        let response = self.send(url, cancel).await?;
        serde_json::from_slice(strip_xssi_prefix(&response.body)).map_err(GitilesError::Json)
    }

    /// The newest `limit` commits reachable from `reference`.
    pub async fn log(
        &self,
        project: &str,
        reference: &str,
        limit: u32,
        cancel: &CancellationToken,
    ) -> Result<GitilesLog, GitilesError> {
        self.get_json(self.log_url(project, reference, limit), cancel)
            .await
    }

    /// One commit with its tree diff against the first parent.
    pub async fn commit(
        &self,
        project: &str,
        commit: &str,
        cancel: &CancellationToken,
    ) -> Result<GitilesCommit, GitilesError> {
        self.get_json(self.commit_url(project, commit), cancel)
            .await
    }

    /// Unified diff of `commit` against its parent.
    ///
    /// `format=TEXT` bodies are base64 and carry no XSSI prefix.
    /// Bytes that are not UTF-8 are replaced with U+FFFD.
    pub async fn patch(
        &self,
        project: &str,
        commit: &str,
        cancel: &CancellationToken,
    ) -> Result<String, GitilesError> {
        let response = self.send(self.patch_url(project, commit), cancel).await?;
        let encoded: Vec<u8> = response
            .body
            .into_iter()
            .filter(|b| !b.is_ascii_whitespace())
            .collect();
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| GitilesError::Decode(e.to_string()))?;
        Ok(String::from_utf8_lossy(&decoded).into_owned())
    }
}
