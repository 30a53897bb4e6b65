//! Local generative model client (Ollama-compatible HTTP API).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

use crate::http::{HttpError, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
use crate::retry::RetryClass;

/// Default endpoint of a local model server.
pub const DEFAULT_MODEL_URL: &str = "http://localhost:11434";

/// Default model name.
pub const DEFAULT_MODEL: &str = "llama3";

/// Timeout for the `/api/tags` preflight.
const PREFLIGHT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum GenerateError {
    /// The model server could not be reached.
    #[error("model server unavailable: {0}")]
    Unavailable(#[source] HttpError),

    #[error("generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("http error: {0}")]
    Http(#[source] HttpError),

    #[error("model server returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("invalid model server response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("model {model} is not installed (available: {})", available.join(", "))]
    ModelNotInstalled {
        model: String,
        available: Vec<String>,
    },

    #[error("cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<HttpError> for GenerateError {
    fn from(err: HttpError) -> Self {
        if err.is_connection() {
            GenerateError::Unavailable(err)
        } else {
            GenerateError::Http(err)
        }
    }
}

impl RetryClass for GenerateError {
    /// A missing model will not appear by waiting either.
    fn is_connection(&self) -> bool {
        matches!(
            self,
            GenerateError::Unavailable(_) | GenerateError::ModelNotInstalled { .. }
        )
    }

    fn is_cancelled(&self) -> bool {
        matches!(self, GenerateError::Cancelled)
    }
}

/// One-shot text generation.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<String, GenerateError>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

/// True when `installed` satisfies `wanted`; a bare name matches its `:latest` tag.
fn model_matches(wanted: &str, installed: &str) -> bool {
    installed == wanted
        || (!wanted.contains(':')
            && installed
                .strip_suffix(":latest")
                .is_some_and(|base| base == wanted))
}

/// Client for `/api/generate`.
///
/// The first `generate` call checks `/api/tags` once and fails with
/// [`GenerateError::ModelNotInstalled`] when the model is missing.
#[derive(Clone)]
pub struct GenerativeClient {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    model: String,
    preflight: Arc<OnceCell<()>>,
}

impl std::fmt::Debug for GenerativeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerativeClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

impl GenerativeClient {
    /// Timeouts are applied per call, so the reqwest client carries none.
    pub fn new(base_url: &str, model: &str) -> Result<Self, GenerateError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| GenerateError::Config(e.to_string()))?;
        Ok(Self::new_with_transport(
            base_url,
            model,
            Arc::new(ReqwestTransport::new(client)),
        ))
    }

    pub fn new_with_transport(
        base_url: &str,
        model: &str,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            preflight: Arc::new(OnceCell::new()),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(
        &self,
        request: HttpRequest,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse, GenerateError> {
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(GenerateError::Cancelled),
            result = tokio::time::timeout(timeout, self.transport.send(request)) => {
                result.map_err(|_| GenerateError::Timeout(timeout))??
            }
        };

        if !response.is_success() {
            return Err(GenerateError::Api {
                status: response.status,
                message: response.body_text().trim().to_string(),
            });
        }
        Ok(response)
    }

    /// Names of the installed models, failing when the configured one is absent.
    pub async fn check_model(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, GenerateError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .send(HttpRequest::get(url), PREFLIGHT_TIMEOUT, cancel)
            .await?;
        let tags: TagsResponse = serde_json::from_slice(&response.body)?;
        let available: Vec<String> = tags.models.into_iter().map(|m| m.name).collect();

        if available.iter().any(|name| model_matches(&self.model, name)) {
            tracing::debug!(model = %self.model, "Model is installed");
            Ok(available)
        } else {
            Err(GenerateError::ModelNotInstalled {
                model: self.model.clone(),
                available,
            })
        }
    }
}

#[async_trait]
impl Generator for GenerativeClient {
    async fn generate(
        &self,
        prompt: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<String, GenerateError> {
        self.preflight
            .get_or_try_init(|| async { self.check_model(cancel).await.map(|_| ()) })
            .await?;

        let body = serde_json::to_vec(&GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        })?;
        let url = format!("{}/api/generate", self.base_url);

        let started = std::time::Instant::now();
        let response = self
            .send(HttpRequest::post_json(url, body), timeout, cancel)
            .await?;
        let parsed: GenerateResponse = serde_json::from_slice(&response.body)?;

        tracing::debug!(
            model = %self.model,
            elapsed_ms = started.elapsed().as_millis() as u64,
            chars = parsed.response.len(),
            "Generation complete"
        );
        Ok(parsed.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpMethod, MockTransport};

    const BASE: &str = "http://models.local:11434";

    fn client(transport: &MockTransport, model: &str) -> GenerativeClient {
        GenerativeClient::new_with_transport(
            &format!("{BASE}/"),
            model,
            Arc::new(transport.clone()),
        )
    }

    fn push_tags(transport: &MockTransport, names: &[&str]) {
        let models: Vec<_> = names
            .iter()
            .map(|n| serde_json::json!({ "name": n }))
            .collect();
        transport.push_json(
            HttpMethod::Get,
            format!("{BASE}/api/tags"),
            200,
            serde_json::json!({ "models": models }).to_string(),
        );
    }

    #[test]
    fn bare_name_matches_latest_tag() {
        assert!(model_matches("llama3", "llama3"));
        assert!(model_matches("llama3", "llama3:latest"));
        assert!(!model_matches("llama3", "llama3:8b"));
        assert!(!model_matches("llama3:8b", "llama3:latest"));
        assert!(model_matches("llama3:8b", "llama3:8b"));
    }

    #[tokio::test]
    async fn generate_posts_non_streaming_request() {
        let transport = MockTransport::new();
        let client = client(&transport, "llama3");
        push_tags(&transport, &["llama3:latest"]);
        transport.push_json(
            HttpMethod::Post,
            format!("{BASE}/api/generate"),
            200,
            r#"{"response": "A short summary.", "done": true}"#,
        );

        let text = client
            .generate("Summarize", Duration::from_secs(5), &CancellationToken::new())
            .await
            .expect("generation succeeds");
        assert_eq!(text, "A short summary.");

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        let body: serde_json::Value =
            serde_json::from_slice(&requests[1].body).expect("json body");
        assert_eq!(
            body,
            serde_json::json!({"model": "llama3", "prompt": "Summarize", "stream": false})
        );
    }

    #[tokio::test]
    async fn preflight_runs_once() {
        let transport = MockTransport::new();
        let client = client(&transport, "llama3");
        push_tags(&transport, &["llama3"]);
        for _ in 0..2 {
            transport.push_json(
                HttpMethod::Post,
                format!("{BASE}/api/generate"),
                200,
                r#"{"response": "ok"}"#,
            );
        }

        let cancel = CancellationToken::new();
        for _ in 0..2 {
            client
                .generate("p", Duration::from_secs(5), &cancel)
                .await
                .expect("generation succeeds");
        }

        let tag_requests = transport
            .requests()
            .iter()
            .filter(|r| r.url.ends_with("/api/tags"))
            .count();
        assert_eq!(tag_requests, 1);
    }

    #[tokio::test]
    async fn missing_model_is_reported_with_alternatives() {
        let transport = MockTransport::new();
        let client = client(&transport, "mistral");
        push_tags(&transport, &["llama3:latest", "phi3:mini"]);

        let err = client
            .generate("p", Duration::from_secs(5), &CancellationToken::new())
            .await
            .expect_err("model missing");
        match &err {
            GenerateError::ModelNotInstalled { model, available } => {
                assert_eq!(model, "mistral");
                assert_eq!(available, &vec!["llama3:latest".to_string(), "phi3:mini".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.is_connection());
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn refused_connection_is_unavailable() {
        let transport = MockTransport::new();
        let client = client(&transport, "llama3");
        transport.push_error(
            HttpMethod::Get,
            format!("{BASE}/api/tags"),
            HttpError::Connect("connection refused".into()),
        );

        let err = client
            .generate("p", Duration::from_secs(5), &CancellationToken::new())
            .await
            .expect_err("server down");
        assert!(matches!(err, GenerateError::Unavailable(_)));
        assert!(err.is_connection());
    }

    #[tokio::test]
    async fn server_error_is_retryable_api_error() {
        let transport = MockTransport::new();
        let client = client(&transport, "llama3");
        push_tags(&transport, &["llama3"]);
        transport.push_json(
            HttpMethod::Post,
            format!("{BASE}/api/generate"),
            500,
            "model overloaded",
        );

        let err = client
            .generate("p", Duration::from_secs(5), &CancellationToken::new())
            .await
            .expect_err("500");
        assert!(matches!(err, GenerateError::Api { status: 500, .. }));
        assert!(!err.is_connection());
        assert!(!err.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_sending() {
        let transport = MockTransport::new();
        let client = client(&transport, "llama3");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = client
            .generate("p", Duration::from_secs(5), &cancel)
            .await
            .expect_err("cancelled");
        assert!(err.is_cancelled());
        assert!(transport.requests().is_empty());
    }
}
