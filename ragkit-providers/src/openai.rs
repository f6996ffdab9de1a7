//! OpenAI provider implementation
//!
//! Also compatible with OpenAI-compatible APIs (Groq, Mistral, local
//! gateways) via a custom base URL. Implements both the chat-completion
//! and embedding backend traits.

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use crate::{
    ChatProvider, ChatRequest, Completion, EmbeddingBackend, Error, HttpConfig, Result,
    StreamingChoice, StreamingResponse,
};

/// OpenAI API client
pub struct OpenAi {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAi {
    /// Create from API key
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, "https://api.openai.com/v1")
    }

    /// Create from environment variable
    ///
    /// A missing key is a non-recoverable misconfiguration and raises
    /// immediately, unlike runtime backend failures.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| Error::Config("OPENAI_API_KEY not set".to_string()))?;
        Self::new(api_key)
    }

    /// Create with custom base URL (for compatible APIs)
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let config = HttpConfig::default();
        let client = config.build_client()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into(),
        })
    }

    fn build_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))
                .map_err(|e| Error::Internal(e.to_string()))?,
        );
        Ok(headers)
    }
}

/// Map an API error response onto the pipeline's error taxonomy
fn map_api_error(model: &str, status: reqwest::StatusCode, body: &str) -> Error {
    match status.as_u16() {
        401 => Error::ProviderAuth(format!("OpenAI rejected credentials: {}", body)),
        429 => Error::ProviderRateLimit {
            retry_after_secs: 30,
        },
        // Missing model or plan/access restriction on a model: the caller
        // should try its fallback chain
        403 | 404 if body.contains("model") => Error::ModelUnavailable {
            model: model.to_string(),
            message: body.to_string(),
        },
        _ => Error::ProviderApi(format!("OpenAI API error {}: {}", status, body)),
    }
}

// --- Chat Completions ---

#[derive(Debug, Serialize)]
struct WireChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    total_tokens: u32,
}

/// Streaming chunk from OpenAI
#[derive(Debug, Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

impl OpenAi {
    fn convert_request(request: &ChatRequest, stream: bool) -> WireChatRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(prompt) = &request.system_prompt {
            messages.push(WireMessage {
                role: "system".to_string(),
                content: prompt.clone(),
            });
        }
        for msg in &request.messages {
            messages.push(WireMessage {
                role: msg.role.as_str().to_string(),
                content: msg.content.clone(),
            });
        }

        WireChatRequest {
            model: request.model.clone(),
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: request.json_mode.then(|| ResponseFormat {
                format_type: "json_object".to_string(),
            }),
            stream,
        }
    }
}

#[async_trait]
impl ChatProvider for OpenAi {
    async fn complete(&self, request: ChatRequest) -> Result<Completion> {
        let model = request.model.clone();
        let wire = Self::convert_request(&request, false);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .headers(self.build_headers()?)
            .json(&wire)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(map_api_error(&model, status, &text));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::ProviderApi(format!("Failed to parse chat response: {}", e)))?;

        let text = body
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| Error::ProviderApi("No completion returned".to_string()))?;

        Ok(Completion {
            text,
            tokens_used: body.usage.map(|u| u.total_tokens).unwrap_or(0),
        })
    }

    async fn stream_completion(&self, request: ChatRequest) -> Result<StreamingResponse> {
        let model = request.model.clone();
        let wire = Self::convert_request(&request, true);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .headers(self.build_headers()?)
            .json(&wire)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(map_api_error(&model, status, &text));
        }

        let stream = Box::pin(response.bytes_stream());
        Ok(StreamingResponse::from_stream(parse_sse_stream(stream)))
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

/// Parse Server-Sent Events stream from OpenAI into content chunks
fn parse_sse_stream<S>(
    stream: S,
) -> impl Stream<Item = std::result::Result<StreamingChoice, Error>>
where
    S: Stream<Item = std::result::Result<bytes::Bytes, reqwest::Error>> + Send + Unpin + 'static,
{
    let sse_buffer = crate::utils::SseBuffer::new();
    let string_buffer = String::new();

    futures::stream::unfold(
        (stream, sse_buffer, string_buffer),
        move |(mut stream, mut bytes_buffer, mut text_buffer)| async move {
            loop {
                // Try to extract a complete SSE message from buffer
                if let Some(pos) = text_buffer.find("\n\n") {
                    let message = text_buffer[..pos].to_string();
                    text_buffer = text_buffer[pos + 2..].to_string();

                    if let Some(data) = message.strip_prefix("data: ") {
                        if data.trim() == "[DONE]" {
                            return Some((
                                Ok(StreamingChoice::Done),
                                (stream, bytes_buffer, text_buffer),
                            ));
                        }

                        match serde_json::from_str::<StreamChunk>(data) {
                            Ok(chunk) => {
                                if let Some(content) = chunk
                                    .choices
                                    .first()
                                    .and_then(|c| c.delta.content.as_ref())
                                {
                                    if !content.is_empty() {
                                        return Some((
                                            Ok(StreamingChoice::Message(content.clone())),
                                            (stream, bytes_buffer, text_buffer),
                                        ));
                                    }
                                }
                            }
                            Err(e) => {
                                tracing::warn!("Failed to parse SSE chunk: {}", e);
                            }
                        }
                    }
                    // Process the next buffered message before reading more
                    continue;
                }

                // Need more data
                match stream.next().await {
                    Some(Ok(bytes)) => match bytes_buffer.push_and_get_text(&bytes) {
                        Ok(new_text) => text_buffer.push_str(&new_text),
                        Err(e) => {
                            return Some((Err(e), (stream, bytes_buffer, text_buffer)));
                        }
                    },
                    Some(Err(e)) => {
                        return Some((Err(Error::Http(e)), (stream, bytes_buffer, text_buffer)));
                    }
                    None => {
                        // Stream ended
                        return None;
                    }
                }
            }
        },
    )
}

// --- Embeddings ---

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    input: Vec<String>,
    model: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingBackend for OpenAi {
    async fn embed_batch(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingRequest {
            input: texts.to_vec(),
            model: model.to_string(),
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .headers(self.build_headers()?)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(map_api_error(model, status, &text));
        }

        let mut body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::ProviderApi(format!("Failed to parse embedding response: {}", e)))?;

        if body.data.len() != texts.len() {
            return Err(Error::ProviderApi(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                body.data.len()
            )));
        }

        // The API documents index-ordered data, but sort defensively on the
        // declared index field rather than trusting array position
        body.data.sort_by_key(|d| d.index);
        Ok(body.data.into_iter().map(|d| d.embedding).collect())
    }
}

/// Default chat model
pub const GPT_4O_MINI: &str = "gpt-4o-mini";
/// Larger chat model
pub const GPT_4O: &str = "gpt-4o";
/// Default embedding model
pub const TEXT_EMBEDDING_3_SMALL: &str = "text-embedding-3-small";

#[cfg(test)]
mod tests {
    use super::*;
    use ragkit_core::message::Message;

    #[test]
    fn test_request_conversion() {
        let request = ChatRequest {
            model: "gpt-4o-mini".to_string(),
            system_prompt: Some("Be helpful".to_string()),
            messages: vec![Message::user("Hello"), Message::assistant("Hi there!")],
            temperature: Some(0.1),
            max_tokens: Some(500),
            json_mode: false,
        };

        let wire = OpenAi::convert_request(&request, false);
        assert_eq!(wire.messages.len(), 3);
        assert_eq!(wire.messages[0].role, "system");
        assert_eq!(wire.messages[1].role, "user");
        assert_eq!(wire.messages[2].role, "assistant");
        assert!(!wire.stream);
        assert!(wire.response_format.is_none());
    }

    #[test]
    fn test_json_mode_sets_response_format() {
        let request = ChatRequest {
            model: "gpt-4o-mini".to_string(),
            json_mode: true,
            ..Default::default()
        };
        let wire = OpenAi::convert_request(&request, false);
        assert_eq!(
            wire.response_format.map(|f| f.format_type),
            Some("json_object".to_string())
        );
    }

    #[test]
    fn test_error_mapping() {
        let err = map_api_error(
            "text-embedding-3-large",
            reqwest::StatusCode::NOT_FOUND,
            "The model `text-embedding-3-large` does not exist",
        );
        assert!(err.is_model_unavailable());

        let err = map_api_error("m", reqwest::StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(err.is_retryable());
    }
}
