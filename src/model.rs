//! Completion-model client: one round-trip to an OpenAI-compatible
//! chat-completions endpoint.
//!
//! The seam is [`CompletionModel`], an object-safe async trait. The
//! pipelines only ever see `Arc<dyn CompletionModel>`, so tests substitute
//! counting doubles and embedders can wrap the client with caching or
//! rate-limiting middleware without touching pipeline code.
//!
//! Deliberately absent: automatic retries and streaming. A failed call
//! surfaces as a classified [`ModelCallError`] and the pipeline converts
//! it into a fail-closed verdict/outcome; the response is awaited in full
//! because the parser needs the complete JSON document anyway.

use crate::config::PipelineConfig;
use crate::error::{ModelCallError, PipelineError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// A generative text-completion service.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    /// Send one system + user prompt pair and return the raw completion
    /// text. The returned text is *untrusted* — callers must go through
    /// [`crate::parse`] before acting on it.
    async fn complete(
        &self,
        system: &str,
        user: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, ModelCallError>;
}

/// Resolve the model for a pipeline run: an injected override wins,
/// otherwise a fresh [`OpenAiChatClient`] is built from the config.
pub fn resolve_model(config: &PipelineConfig) -> Result<Arc<dyn CompletionModel>, PipelineError> {
    if let Some(model) = &config.model_override {
        return Ok(Arc::clone(model));
    }
    Ok(Arc::new(OpenAiChatClient::new(config)?))
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

// ── Client ───────────────────────────────────────────────────────────────

/// HTTP client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiChatClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    timeout_secs: u64,
}

impl OpenAiChatClient {
    /// Build a client from config. Fails when no API key is present —
    /// callers without a key should inject a `model_override` instead.
    pub fn new(config: &PipelineConfig) -> Result<Self, PipelineError> {
        if config.api_key.is_empty() {
            return Err(PipelineError::ModelNotConfigured {
                hint: "api_key is empty and no model_override was injected".into(),
            });
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()
            .map_err(|e| PipelineError::ModelNotConfigured {
                hint: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            timeout_secs: config.api_timeout_secs,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_base)
    }
}

#[async_trait]
impl CompletionModel for OpenAiChatClient {
    async fn complete(
        &self,
        system: &str,
        user: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, ModelCallError> {
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature,
            max_tokens,
        };

        let started = Instant::now();
        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport(e, started, self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, retry_after_secs, &body));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ModelCallError::Network {
                detail: format!("failed to read response body: {e}"),
            })?;

        if let Some(usage) = &parsed.usage {
            debug!(
                "model call: {} input tokens, {} output tokens, {:?}",
                usage.prompt_tokens,
                usage.completion_tokens,
                started.elapsed()
            );
        }

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();
        let content = content.trim().to_string();
        if content.is_empty() {
            return Err(ModelCallError::EmptyResponse);
        }
        Ok(content)
    }
}

/// Map a transport error onto the call taxonomy.
fn classify_transport(e: reqwest::Error, started: Instant, timeout_secs: u64) -> ModelCallError {
    if e.is_timeout() {
        // reqwest reports the configured timeout, not the wall clock; the
        // elapsed time is close enough for operator diagnostics.
        let elapsed_ms = started.elapsed().as_millis() as u64;
        ModelCallError::Timeout {
            elapsed_ms: elapsed_ms.max(timeout_secs * 1000),
        }
    } else {
        ModelCallError::Network {
            detail: e.to_string(),
        }
    }
}

/// Map a non-2xx status onto the call taxonomy, surfacing the server's
/// own error message where one was sent.
fn classify_status(
    status: reqwest::StatusCode,
    retry_after_secs: Option<u64>,
    body: &str,
) -> ModelCallError {
    match status.as_u16() {
        401 | 403 => ModelCallError::Auth {
            status: status.as_u16(),
            detail: api_error_detail(status, body),
        },
        429 => ModelCallError::RateLimit { retry_after_secs },
        _ => ModelCallError::Api {
            status: status.as_u16(),
            detail: api_error_detail(status, body),
        },
    }
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: Option<ApiErrorDetail>,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
}

/// Pull the human-readable message out of an OpenAI-style error body
/// (`{"error": {"message": ..., "code": ...}}`). Non-JSON bodies are
/// passed through truncated; an empty body falls back to the status line.
fn api_error_detail(status: reqwest::StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(error) = parsed.error {
            if !error.message.is_empty() {
                return error.message;
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("unexpected status")
            .to_string()
    } else if trimmed.len() > 200 {
        let cut = trimmed
            .char_indices()
            .take_while(|(i, _)| *i < 200)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        format!("{}…", &trimmed[..cut])
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_shape() {
        let body = ChatRequest {
            model: "gpt-4o-mini",
            messages: [
                ChatMessage {
                    role: "system",
                    content: "sys",
                },
                ChatMessage {
                    role: "user",
                    content: "usr",
                },
            ],
            temperature: 0.3,
            max_tokens: 1000,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "usr");
        assert_eq!(json["max_tokens"], 1000);
    }

    #[test]
    fn response_tolerates_missing_usage() {
        let raw = r#"{"choices": [{"message": {"content": "{}"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.choices.len(), 1);
        assert!(parsed.usage.is_none());
    }

    #[test]
    fn client_requires_api_key() {
        let config = PipelineConfig::default();
        assert!(OpenAiChatClient::new(&config).is_err());
    }

    #[test]
    fn error_body_message_reaches_the_detail() {
        let body = r#"{"error": {"message": "You exceeded your current quota.", "code": "insufficient_quota"}}"#;
        match classify_status(reqwest::StatusCode::INTERNAL_SERVER_ERROR, None, body) {
            ModelCallError::Api { status, detail } => {
                assert_eq!(status, 500);
                assert_eq!(detail, "You exceeded your current quota.");
            }
            other => panic!("expected Api, got {other:?}"),
        }
    }

    #[test]
    fn auth_error_carries_server_message() {
        let body = r#"{"error": {"message": "Incorrect API key provided."}}"#;
        match classify_status(reqwest::StatusCode::UNAUTHORIZED, None, body) {
            ModelCallError::Auth { status, detail } => {
                assert_eq!(status, 401);
                assert_eq!(detail, "Incorrect API key provided.");
            }
            other => panic!("expected Auth, got {other:?}"),
        }
    }

    #[test]
    fn rate_limit_keeps_retry_after() {
        match classify_status(reqwest::StatusCode::TOO_MANY_REQUESTS, Some(30), "{}") {
            ModelCallError::RateLimit { retry_after_secs } => {
                assert_eq!(retry_after_secs, Some(30));
            }
            other => panic!("expected RateLimit, got {other:?}"),
        }
    }

    #[test]
    fn non_json_error_body_passes_through_truncated() {
        let body = "upstream proxy exploded";
        match classify_status(reqwest::StatusCode::BAD_GATEWAY, None, body) {
            ModelCallError::Api { detail, .. } => assert_eq!(detail, body),
            other => panic!("expected Api, got {other:?}"),
        }

        let long = "x".repeat(400);
        match classify_status(reqwest::StatusCode::BAD_GATEWAY, None, &long) {
            ModelCallError::Api { detail, .. } => {
                assert!(detail.len() < long.len());
                assert!(detail.ends_with('…'));
            }
            other => panic!("expected Api, got {other:?}"),
        }
    }

    #[test]
    fn empty_error_body_falls_back_to_status_line() {
        match classify_status(reqwest::StatusCode::SERVICE_UNAVAILABLE, None, "") {
            ModelCallError::Api { detail, .. } => assert_eq!(detail, "Service Unavailable"),
            other => panic!("expected Api, got {other:?}"),
        }
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        let config = PipelineConfig::builder()
            .api_key("k")
            .api_base("https://example.test/v1/")
            .build()
            .unwrap();
        let client = OpenAiChatClient::new(&config).unwrap();
        assert_eq!(client.endpoint(), "https://example.test/v1/chat/completions");
    }
}
