//! Review-server API client.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use base64::Engine;
use chrono::Utc;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::convert::to_change;
use super::error::GerritError;
use super::query::ChangeQuery;
use super::types::ChangeInfo;
use super::{ChangeSource, strip_xssi_prefix};
use crate::change::Change;
use crate::http::{HttpRequest, HttpTransport, ReqwestTransport};

/// Per-request timeout for the default transport.
const REQUEST_TIMEOUT: StdDuration = StdDuration::from_secs(60);

/// HTTP basic credentials.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Client for the `/changes/` query endpoint.
///
/// Anonymous by default; with credentials, requests go to the
/// authenticated `/a/` prefix using HTTP basic auth.
#[derive(Clone)]
pub struct GerritClient {
    transport: Arc<dyn HttpTransport>,
    base_url: Url,
    credentials: Option<Credentials>,
}

impl GerritClient {
    /// Create a client over a reqwest transport.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let client = GerritClient::new("https://review.example.org", None)?;
    /// ```
    pub fn new(base_url: &str, credentials: Option<Credentials>) -> Result<Self, GerritError> {
        let transport = ReqwestTransport::with_timeout(REQUEST_TIMEOUT)
            .map_err(|e| GerritError::Config(e.to_string()))?;
        Self::new_with_transport(base_url, credentials, Arc::new(transport))
    }

    pub fn new_with_transport(
        base_url: &str,
        credentials: Option<Credentials>,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, GerritError> {
        // A trailing slash makes `Url::join` append rather than replace.
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalized)
            .map_err(|e| GerritError::Config(format!("invalid base URL {base_url}: {e}")))?;
        Ok(Self {
            transport,
            base_url,
            credentials,
        })
    }

    /// Base URL without the trailing slash.
    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    pub fn is_authenticated(&self) -> bool {
        self.credentials.is_some()
    }

    fn endpoint(&self, path: &str) -> Result<Url, GerritError> {
        let path = if self.credentials.is_some() {
            format!("a/{path}")
        } else {
            path.to_string()
        };
        self.base_url
            .join(&path)
            .map_err(|e| GerritError::Config(e.to_string()))
    }

    /// Full URL for one page of `query`.
    pub fn changes_url(&self, query: &ChangeQuery) -> Result<String, GerritError> {
        let mut url = self.endpoint("changes/")?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("q", &query.query)
                .append_pair("n", &query.limit.to_string())
                .append_pair("S", &query.start.to_string());
            for flag in &query.flags {
                pairs.append_pair("o", flag.as_str());
            }
        }
        Ok(url.to_string())
    }

    async fn get<T: DeserializeOwned>(
        &self,
        url: String,
        cancel: &CancellationToken,
    ) -> Result<T, GerritError> {
        let mut request = HttpRequest::get(url);
        if let Some(creds) = &self.credentials {
            let token = base64::engine::general_purpose::STANDARD
                .encode(format!("{}:{}", creds.username, creds.password));
            request = request.with_header("Authorization", format!("Basic {token}"));
        }

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(GerritError::Cancelled),
            response = self.transport.send(request) => response?,
        };

        if !response.is_success() {
            return Err(GerritError::api(response.status, &response.body_text()));
        }

        serde_json::from_slice(strip_xssi_prefix(&response.body)).map_err(GerritError::Json)
    }

    /// Fetch one raw page of change records.
    pub async fn query_change_infos(
        &self,
        query: &ChangeQuery,
        cancel: &CancellationToken,
    ) -> Result<Vec<ChangeInfo>, GerritError> {
        let url = self.changes_url(query)?;
        tracing::debug!(url = %url, "Querying changes");
        self.get(url, cancel).await
    }
}

#[async_trait]
impl ChangeSource for GerritClient {
    async fn query_changes(
        &self,
        query: &ChangeQuery,
        cancel: &CancellationToken,
    ) -> Result<Vec<Change>, GerritError> {
        let infos = self.query_change_infos(query, cancel).await?;
        let synced_at = Utc::now();
        Ok(infos
            .into_iter()
            .map(|info| to_change(info, synced_at))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gerrit::query::{FULL_DETAIL, LIGHT_DETAIL};
    use crate::http::{HttpError, HttpMethod, MockTransport, header_get};

    fn change_json(number: i64, branch: &str) -> serde_json::Value {
        serde_json::json!({
            "project": "demo",
            "branch": branch,
            "change_id": format!("I{number}"),
            "subject": format!("Change {number}"),
            "status": "NEW",
            "created": "2024-05-01 10:00:00.000000000",
            "updated": "2024-05-01 11:00:00.000000000",
            "_number": number,
            "owner": {"name": "Ada"}
        })
    }

    fn client(transport: &MockTransport, credentials: Option<Credentials>) -> GerritClient {
        GerritClient::new_with_transport(
            "https://review.example.org/",
            credentials,
            Arc::new(transport.clone()),
        )
        .expect("valid base URL")
    }

    #[test]
    fn changes_url_encodes_query_and_repeats_flags() {
        let transport = MockTransport::new();
        let client = client(&transport, None);
        let query = ChangeQuery::new("project:demo status:open", 25, LIGHT_DETAIL).at(50);

        let url = client.changes_url(&query).expect("url");
        assert_eq!(
            url,
            "https://review.example.org/changes/?q=project%3Ademo+status%3Aopen&n=25&S=50&o=LABELS&o=DETAILED_ACCOUNTS"
        );
    }

    #[test]
    fn authenticated_client_uses_a_prefix() {
        let transport = MockTransport::new();
        let client = client(
            &transport,
            Some(Credentials {
                username: "bot".into(),
                password: "secret".into(),
            }),
        );
        let url = client
            .changes_url(&ChangeQuery::new("status:open", 10, &[]))
            .expect("url");
        assert!(url.starts_with("https://review.example.org/a/changes/?"));
    }

    #[test]
    fn base_url_keeps_path_prefix() {
        let transport = MockTransport::new();
        let client = GerritClient::new_with_transport(
            "https://example.org/gerrit",
            None,
            Arc::new(transport),
        )
        .expect("valid");
        assert_eq!(client.base_url(), "https://example.org/gerrit");
        let url = client
            .changes_url(&ChangeQuery::new("status:open", 1, &[]))
            .expect("url");
        assert!(url.starts_with("https://example.org/gerrit/changes/?"));
    }

    #[test]
    fn invalid_base_url_is_a_config_error() {
        let err = GerritClient::new_with_transport("not a url", None, Arc::new(MockTransport::new()))
            .err()
            .expect("invalid");
        assert!(matches!(err, GerritError::Config(_)));
    }

    #[tokio::test]
    async fn query_strips_prefix_and_converts_changes() {
        let transport = MockTransport::new();
        let client = client(&transport, None);
        let query = ChangeQuery::new("status:open", 2, FULL_DETAIL);
        let url = client.changes_url(&query).expect("url");

        let body = format!(
            ")]}}'\n{}",
            serde_json::json!([change_json(1, "main"), change_json(2, "dev")])
        );
        transport.push_json(HttpMethod::Get, &url, 200, body);

        let changes = client
            .query_changes(&query, &CancellationToken::new())
            .await
            .expect("query succeeds");
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].change_number, 1);
        assert_eq!(changes[1].branch, "dev");
    }

    #[tokio::test]
    async fn authenticated_requests_send_basic_auth() {
        let transport = MockTransport::new();
        let client = client(
            &transport,
            Some(Credentials {
                username: "bot".into(),
                password: "secret".into(),
            }),
        );
        let query = ChangeQuery::new("status:open", 1, &[]);
        let url = client.changes_url(&query).expect("url");
        transport.push_json(HttpMethod::Get, &url, 200, ")]}'\n[]");

        client
            .query_changes(&query, &CancellationToken::new())
            .await
            .expect("query succeeds");

        let requests = transport.requests();
        assert_eq!(
            header_get(&requests[0].headers, "authorization"),
            Some("Basic Ym90OnNlY3JldA==")
        );
    }

    #[tokio::test]
    async fn non_success_status_is_an_api_error() {
        let transport = MockTransport::new();
        let client = client(&transport, None);
        let query = ChangeQuery::new("status:open", 1, &[]);
        let url = client.changes_url(&query).expect("url");
        transport.push_json(HttpMethod::Get, &url, 400, "bad query");

        let err = client
            .query_changes(&query, &CancellationToken::new())
            .await
            .expect_err("400");
        match err {
            GerritError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "bad query");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn connection_failure_is_connection_class() {
        let transport = MockTransport::new();
        let client = client(&transport, None);
        let query = ChangeQuery::new("status:open", 1, &[]);
        let url = client.changes_url(&query).expect("url");
        transport.push_error(HttpMethod::Get, &url, HttpError::Connect("refused".into()));

        let err = client
            .query_changes(&query, &CancellationToken::new())
            .await
            .expect_err("refused");
        assert!(err.is_connection());
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits() {
        let transport = MockTransport::new();
        let client = client(&transport, None);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = client
            .query_changes(&ChangeQuery::new("status:open", 1, &[]), &cancel)
            .await
            .expect_err("cancelled");
        assert!(err.is_cancelled());
        assert!(transport.requests().is_empty());
    }
}
