//! Completion service abstraction and the OpenRouter client.
//!
//! The controller only needs "send these messages to this model, give me the reply text";
//! [`CompletionBackend`] is that seam so tests can swap the HTTP client out.

mod openrouter;

pub use openrouter::{
    parse_completion_body, ChatMessage, CompletionError, CompletionRequest, OpenRouterClient,
    ProviderSettings, DEFAULT_ENDPOINT,
};

/// Something that can turn a completion request into the assistant's reply text.
#[async_trait::async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError>;
}
