//! Client for the Gemini `generateContent` API.
//!
//! One call per [`GeminiClient::generate`]: no retry, no timeout, no cache.
//! The key travels in a request header, so error text never carries it.

use std::fmt;

use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub const DEFAULT_GEMINI_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent";

/// Message used when an upstream error body carries none of its own.
pub const UPSTREAM_FALLBACK_MESSAGE: &str = "Gemini API error";

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, Error)]
pub enum InsightError {
    /// Upstream answered with a non-success status.
    #[error("{message}")]
    Upstream { status: u16, message: String },
    /// Transport failure, stripped of the request URL.
    #[error("{0}")]
    Request(reqwest::Error),
    #[error("{0}")]
    Decode(String),
}

impl InsightError {
    /// HTTP status to report to the caller: the upstream status when there
    /// was one, otherwise 500.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Upstream { status, .. } => *status,
            Self::Request(_) | Self::Decode(_) => StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

/// Credential-bearing Gemini client.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiClient")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_endpoint(api_key, DEFAULT_GEMINI_ENDPOINT)
    }

    #[must_use]
    pub fn with_endpoint(api_key: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self { client: Client::new(), endpoint: endpoint.into(), api_key: api_key.into() }
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send `prompt` and return the first candidate's text.
    ///
    /// A response without candidate text is a success with an empty string.
    ///
    /// # Errors
    /// Returns [`InsightError::Upstream`] with the upstream status and
    /// `error.message` for non-success responses, [`InsightError::Request`]
    /// when the request cannot be sent, and [`InsightError::Decode`] when the
    /// response body is not JSON.
    pub async fn generate(&self, prompt: &str) -> Result<String, InsightError> {
        let request = GenerateRequest { contents: [Content { parts: [Part { text: prompt }] }] };
        let response = self
            .client
            .post(&self.endpoint)
            .header(API_KEY_HEADER, self.api_key.as_str())
            .json(&request)
            .send()
            .await
            .map_err(|err| InsightError::Request(err.without_url()))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|err| InsightError::Decode(err.without_url().to_string()))?;
        tracing::debug!(status = status.as_u16(), "gemini responded");

        if !status.is_success() {
            let message = body
                .pointer("/error/message")
                .and_then(Value::as_str)
                .filter(|message| !message.is_empty())
                .unwrap_or(UPSTREAM_FALLBACK_MESSAGE)
                .to_string();
            return Err(InsightError::Upstream { status: status.as_u16(), message });
        }

        Ok(candidate_text(&body).to_string())
    }
}

fn candidate_text(body: &Value) -> &str {
    body.pointer("/candidates/0/content/parts/0/text").and_then(Value::as_str).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use axum::http::{HeaderMap, StatusCode as AxumStatus, Uri};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;

    use super::*;

    async fn spawn_upstream(router: Router) -> SocketAddr {
        let listener = match tokio::net::TcpListener::bind("127.0.0.1:0").await {
            Ok(listener) => listener,
            Err(err) => panic!("failed to bind stub upstream: {err}"),
        };
        let addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(err) => panic!("stub upstream has no address: {err}"),
        };
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        addr
    }

    fn client_for(addr: SocketAddr) -> GeminiClient {
        GeminiClient::with_endpoint("test-key", format!("http://{addr}/generate"))
    }

    #[tokio::test]
    async fn returns_first_candidate_text_and_sends_key() {
        let router = Router::new().route(
            "/generate",
            post(|uri: Uri, headers: HeaderMap, Json(body): Json<Value>| async move {
                let prompt =
                    body.pointer("/contents/0/parts/0/text").cloned().unwrap_or(Value::Null);
                let key = headers
                    .get(API_KEY_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                let query = uri.query().unwrap_or_default();
                let text = format!("{key}: {prompt}{query}");
                Json(json!({"candidates": [{"content": {"parts": [{"text": text}]}}]}))
            }),
        );
        let addr = spawn_upstream(router).await;

        let text = client_for(addr)
            .generate("summarize")
            .await
            .unwrap_or_else(|err| panic!("generate should succeed: {err}"));
        assert_eq!(text, "test-key: \"summarize\"");
    }

    #[tokio::test]
    async fn missing_candidates_is_empty_success() {
        let router = Router::new()
            .route("/generate", post(|| async { Json(json!({"candidates": []})) }));
        let addr = spawn_upstream(router).await;

        let text = client_for(addr)
            .generate("summarize")
            .await
            .unwrap_or_else(|err| panic!("generate should succeed: {err}"));
        assert_eq!(text, "");
    }

    #[tokio::test]
    async fn upstream_error_keeps_status_and_message() {
        let router = Router::new().route(
            "/generate",
            post(|| async {
                let body = json!({"error": {"message": "Quota exceeded"}});
                (AxumStatus::TOO_MANY_REQUESTS, Json(body))
            }),
        );
        let addr = spawn_upstream(router).await;

        match client_for(addr).generate("summarize").await {
            Err(err @ InsightError::Upstream { .. }) => {
                assert_eq!(err.status_code(), 429);
                assert_eq!(err.to_string(), "Quota exceeded");
            }
            other => panic!("expected upstream error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn upstream_error_without_message_uses_fallback() {
        let router = Router::new()
            .route("/generate", post(|| async { (AxumStatus::BAD_REQUEST, Json(json!({}))) }));
        let addr = spawn_upstream(router).await;

        match client_for(addr).generate("summarize").await {
            Err(InsightError::Upstream { status, message }) => {
                assert_eq!(status, 400);
                assert_eq!(message, UPSTREAM_FALLBACK_MESSAGE);
            }
            other => panic!("expected upstream error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_json_body_is_decode_failure() {
        let router = Router::new().route("/generate", post(|| async { "plain text" }));
        let addr = spawn_upstream(router).await;

        match client_for(addr).generate("summarize").await {
            Err(err @ InsightError::Decode(_)) => assert_eq!(err.status_code(), 500),
            other => panic!("expected decode error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_upstream_is_request_failure() {
        let listener = match tokio::net::TcpListener::bind("127.0.0.1:0").await {
            Ok(listener) => listener,
            Err(err) => panic!("failed to bind: {err}"),
        };
        let addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(err) => panic!("no address: {err}"),
        };
        drop(listener);

        let client =
            GeminiClient::with_endpoint("SECRET-KEY-123", format!("http://{addr}/generate"));
        match client.generate("summarize").await {
            Err(err @ InsightError::Request(_)) => {
                assert_eq!(err.status_code(), 500);
                let rendered = format!("{err} {err:?}");
                assert!(!rendered.contains("SECRET-KEY-123"), "key leaked: {rendered}");
                assert!(!err.to_string().contains("/generate"), "url leaked: {err}");
            }
            other => panic!("expected request error, got {other:?}"),
        }
    }

    #[test]
    fn debug_output_redacts_key() {
        let rendered = format!("{:?}", GeminiClient::new("secret-key"));
        assert!(!rendered.contains("secret-key"));
        assert!(rendered.contains(DEFAULT_GEMINI_ENDPOINT));
    }
}
