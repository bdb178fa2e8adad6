//! OpenRouter client (OpenAI-compatible `chat/completions`, non-streaming).
//!
//! One POST per turn. Auth is a bearer key; two informational headers identify the app
//! to OpenRouter. A missing key is not checked here: the service rejects the call and
//! the caller sees [`CompletionError::Unauthorized`].

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::CompletionBackend;
use crate::session::Role;

pub const DEFAULT_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Resolved transport settings (see `config::resolve_provider`).
#[derive(Clone)]
pub struct ProviderSettings {
    pub api_key: Option<String>,
    pub endpoint: String,
    /// Sent as `HTTP-Referer`.
    pub referer: String,
    /// Sent as `X-Title`.
    pub title: String,
    /// Upper bound for one round trip; the call fails with `Timeout` after this.
    pub timeout: Duration,
}

impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("endpoint", &self.endpoint)
            .field("referer", &self.referer)
            .field("title", &self.title)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("completion request failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("completion request timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("completion service rejected the credentials: {status} {body}")]
    Unauthorized { status: u16, body: String },
    #[error("completion service error: {status} {body}")]
    Api { status: u16, body: String },
    #[error("malformed completion response: {0}")]
    Parse(String),
    /// The task running the call ended without handing back a result.
    #[error("completion call ended without a result")]
    Interrupted,
}

impl CompletionError {
    /// HTTP status when the service answered with a non-2xx response.
    pub fn status(&self) -> Option<u16> {
        match self {
            CompletionError::Unauthorized { status, .. } | CompletionError::Api { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }
}

/// A message as sent upstream: role and content only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// Request body for `POST chat/completions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

/// Client for the OpenRouter chat completions endpoint.
#[derive(Clone)]
pub struct OpenRouterClient {
    settings: ProviderSettings,
    client: reqwest::Client,
}

impl OpenRouterClient {
    pub fn new(settings: ProviderSettings) -> Result<Self, CompletionError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(CompletionError::Request)?;
        Ok(Self { settings, client })
    }

    pub fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    /// POST the request and return `choices[0].message.content`.
    pub async fn chat(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        log::debug!(
            "openrouter: POST {} model={} messages={}",
            self.settings.endpoint,
            request.model,
            request.messages.len()
        );
        let mut req = self
            .client
            .post(&self.settings.endpoint)
            .header("HTTP-Referer", &self.settings.referer)
            .header("X-Title", &self.settings.title)
            .json(request);
        if let Some(key) = self.settings.api_key.as_deref() {
            req = req.bearer_auth(key);
        }
        let res = req.send().await.map_err(|e| self.transport_error(e))?;
        let status = res.status();
        let body = res.text().await.map_err(|e| self.transport_error(e))?;
        if !status.is_success() {
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => CompletionError::Unauthorized {
                    status: status.as_u16(),
                    body,
                },
                _ => CompletionError::Api {
                    status: status.as_u16(),
                    body,
                },
            });
        }
        parse_completion_body(&body)
    }

    fn transport_error(&self, e: reqwest::Error) -> CompletionError {
        if e.is_timeout() {
            CompletionError::Timeout(self.settings.timeout)
        } else {
            CompletionError::Request(e)
        }
    }
}

#[async_trait::async_trait]
impl CompletionBackend for OpenRouterClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        self.chat(request).await
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Extract the first completion's text from a 2xx body. Anything else is a parse failure.
pub fn parse_completion_body(body: &str) -> Result<String, CompletionError> {
    let data: CompletionResponse =
        serde_json::from_str(body).map_err(|e| CompletionError::Parse(e.to_string()))?;
    if let Some(choice) = data.choices.into_iter().next() {
        return Ok(choice.message.content);
    }
    let reason = match data.error.and_then(|e| e.message) {
        Some(msg) => format!("no choices in response (service said: {})", msg),
        None => "no choices in response".to_string(),
    };
    Err(CompletionError::Parse(reason))
}
