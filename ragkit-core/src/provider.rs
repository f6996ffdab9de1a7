//! Provider trait for chat-completion backends

use async_trait::async_trait;

use crate::error::Result;
use crate::message::Message;
use crate::streaming::StreamingResponse;

/// Request for a chat completion
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    /// Model name to use
    pub model: String,
    /// Optional system prompt
    pub system_prompt: Option<String>,
    /// Conversation history
    pub messages: Vec<Message>,
    /// Optional temperature setting
    pub temperature: Option<f64>,
    /// Optional max tokens
    pub max_tokens: Option<u64>,
    /// Request strict JSON output (response_format: json_object)
    pub json_mode: bool,
}

/// A completed (non-streaming) chat response
#[derive(Debug, Clone)]
pub struct Completion {
    /// Full response text
    pub text: String,
    /// Total tokens consumed by the request, as reported by the backend
    pub tokens_used: u32,
}

/// Trait for chat-completion providers
///
/// Implement this trait to add support for a new LLM backend.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Run a completion request to completion and return the full text
    async fn complete(&self, request: ChatRequest) -> Result<Completion>;

    /// Stream a completion request
    async fn stream_completion(&self, request: ChatRequest) -> Result<StreamingResponse>;

    /// Get provider name (for logging/debugging)
    fn name(&self) -> &'static str;

    /// Check if provider supports streaming
    fn supports_streaming(&self) -> bool {
        true
    }
}
