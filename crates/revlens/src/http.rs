//! HTTP seam shared by the review-server, Gitiles and model clients.

use std::time::Duration as StdDuration;

use async_trait::async_trait;
use thiserror::Error;

/// Methods the clients issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

/// Ordered header pairs; look names up with [`header_get`].
pub type HttpHeaders = Vec<(String, String)>;

/// An outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HttpHeaders,
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// A bodyless GET with an `Accept: application/json` header.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            headers: vec![
                ("Accept".to_string(), "application/json".to_string()),
                ("User-Agent".to_string(), "revlens".to_string()),
            ],
            body: Vec::new(),
        }
    }

    /// A JSON POST.
    pub fn post_json(url: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            headers: vec![
                ("Content-Type".to_string(), "application/json".to_string()),
                ("User-Agent".to_string(), "revlens".to_string()),
            ],
            body,
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }
}

/// A buffered response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HttpHeaders,
    pub body: Vec<u8>,
}

impl HttpResponse {
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        header_get(&self.headers, name)
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Response body as lossy UTF-8, for error messages.
    #[must_use]
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }
}

#[derive(Debug, Error)]
pub enum HttpError {
    /// The remote host could not be reached at all.
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("http transport error: {0}")]
    Transport(String),

    #[error("no mock response registered for {method} {url}")]
    NoMockResponse { method: String, url: String },
}

impl HttpError {
    /// True when the failure means the service is unreachable.
    #[must_use]
    pub fn is_connection(&self) -> bool {
        matches!(self, HttpError::Connect(_))
    }
}

/// Sends one request. Every client owns an `Arc<dyn HttpTransport>`.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
}

/// First value for `name`, compared ASCII case-insensitively.
#[must_use]
pub fn header_get<'a>(headers: &'a HttpHeaders, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// reqwest-backed transport; connect failures map to [`HttpError::Connect`].
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn with_timeout(timeout: StdDuration) -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(StdDuration::from_secs(10))
            .build()
            .map_err(|e| HttpError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> HttpError {
    if err.is_connect() {
        HttpError::Connect(err.to_string())
    } else if err.is_timeout() {
        HttpError::Timeout(err.to_string())
    } else {
        HttpError::Transport(err.to_string())
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
        };

        let mut builder = self.client.request(method, &request.url);
        for (k, v) in request.headers {
            builder = builder.header(&k, &v);
        }

        if !request.body.is_empty() {
            builder = builder.body(request.body);
        }

        let resp = builder.send().await.map_err(classify_reqwest_error)?;

        let status = resp.status().as_u16();
        let mut headers: HttpHeaders = Vec::new();
        for (name, value) in resp.headers().iter() {
            headers.push((
                name.as_str().to_string(),
                value.to_str().unwrap_or_default().to_string(),
            ));
        }

        let body = resp
            .bytes()
            .await
            .map_err(classify_reqwest_error)?
            .to_vec();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
use std::collections::{HashMap, VecDeque};
#[cfg(test)]
use std::sync::{Arc, Mutex};

/// Scripted transport for tests.
///
/// Entries are queued per (method, URL) and handed out in order; every
/// request is recorded for later assertions.
#[cfg(test)]
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

#[cfg(test)]
#[derive(Default)]
struct MockTransportInner {
    routes: HashMap<(HttpMethod, String), VecDeque<Result<HttpResponse, HttpError>>>,
    requests: Vec<HttpRequest>,
}

#[cfg(test)]
impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_response(
        &self,
        method: HttpMethod,
        url: impl Into<String>,
        response: HttpResponse,
    ) {
        self.push(method, url.into(), Ok(response));
    }

    pub fn push_json(
        &self,
        method: HttpMethod,
        url: impl Into<String>,
        status: u16,
        body: impl AsRef<[u8]>,
    ) {
        self.push_response(
            method,
            url,
            HttpResponse {
                status,
                headers: vec![("Content-Type".to_string(), "application/json".to_string())],
                body: body.as_ref().to_vec(),
            },
        );
    }

    pub fn push_error(&self, method: HttpMethod, url: impl Into<String>, error: HttpError) {
        self.push(method, url.into(), Err(error));
    }

    fn push(&self, method: HttpMethod, url: String, entry: Result<HttpResponse, HttpError>) {
        let mut inner = self
            .inner
            .lock()
            .expect("mock transport lock should not be poisoned");
        inner
            .routes
            .entry((method, url))
            .or_default()
            .push_back(entry);
    }

    #[must_use]
    pub fn requests(&self) -> Vec<HttpRequest> {
        let inner = self
            .inner
            .lock()
            .expect("mock transport lock should not be poisoned");
        inner.requests.clone()
    }
}

#[cfg(test)]
#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let mut inner = self
            .inner
            .lock()
            .expect("mock transport lock should not be poisoned");

        let key = (request.method, request.url.clone());
        inner.requests.push(request);

        match inner.routes.get_mut(&key).and_then(|q| q.pop_front()) {
            Some(entry) => entry,
            None => Err(HttpError::NoMockResponse {
                method: key.0.as_str().to_string(),
                url: key.1,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_ignores_case_and_prefers_the_first_value() {
        let response = HttpResponse {
            status: 200,
            headers: vec![
                ("Content-Type".to_string(), "application/json".to_string()),
                ("content-type".to_string(), "text/plain".to_string()),
            ],
            body: b")]}'\n[]".to_vec(),
        };
        assert_eq!(response.header("CONTENT-TYPE"), Some("application/json"));
        assert_eq!(response.header("x-gerrit-auth"), None);
        assert!(response.is_success());
    }

    #[test]
    fn post_json_sets_content_type_and_body() {
        let req = HttpRequest::post_json("http://localhost:11434/api/generate", b"{}".to_vec());
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(header_get(&req.headers, "content-type"), Some("application/json"));
        assert_eq!(req.body, b"{}");
    }

    #[test]
    fn get_request_carries_json_accept_header() {
        let req = HttpRequest::get("https://review.example/changes/").with_header("X-Test", "1");
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(header_get(&req.headers, "accept"), Some("application/json"));
        assert_eq!(header_get(&req.headers, "x-test"), Some("1"));
        assert!(req.body.is_empty());
    }

    #[test]
    fn only_connect_errors_are_connection_class() {
        assert!(HttpError::Connect("refused".into()).is_connection());
        assert!(!HttpError::Timeout("slow".into()).is_connection());
        assert!(!HttpError::Transport("reset".into()).is_connection());
    }

    #[tokio::test]
    async fn mock_transport_returns_registered_responses_in_order() {
        let transport = MockTransport::new();
        let url = "https://review.example/changes/?q=status%3Aopen";
        transport.push_json(HttpMethod::Get, url, 200, "[]");
        transport.push_error(HttpMethod::Get, url, HttpError::Connect("down".into()));

        let resp = transport
            .send(HttpRequest::get(url))
            .await
            .expect("mock response");
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body_text(), "[]");
        assert_eq!(resp.header("content-type"), Some("application/json"));

        let err = transport
            .send(HttpRequest::get(url))
            .await
            .expect_err("second entry is an error");
        assert!(err.is_connection());
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn unscripted_route_is_reported() {
        let transport = MockTransport::new();
        let err = transport
            .send(HttpRequest::get("http://localhost:11434/api/tags"))
            .await
            .expect_err("no scripted response");
        match err {
            HttpError::NoMockResponse { method, url } => {
                assert_eq!(method, "GET");
                assert_eq!(url, "http://localhost:11434/api/tags");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn reqwest_transport_reports_refused_connection_as_connect_error() {
        // Bind then drop to get a port nothing listens on.
        let addr = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
            listener.local_addr().expect("local addr")
        };
        let transport =
            ReqwestTransport::with_timeout(StdDuration::from_secs(2)).expect("transport builds");

        let err = transport
            .send(HttpRequest::get(format!("http://{addr}/api/tags")))
            .await
            .expect_err("nothing is listening");
        assert!(err.is_connection(), "unexpected error: {err:?}");
    }

    #[tokio::test]
    async fn malformed_url_is_a_transport_error() {
        let transport = ReqwestTransport::new(reqwest::Client::new());
        let err = transport
            .send(HttpRequest::get("not a url"))
            .await
            .expect_err("malformed URL");
        assert!(matches!(err, HttpError::Transport(_)));
    }
}
