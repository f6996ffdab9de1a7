//! Mock chat and embedding backends for testing
//!
//! Deterministic, offline stand-ins for the real providers. Both record
//! call counts so tests can assert that caches and fallback chains short
//! out network round trips.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use ragkit_core::streaming::MockStreamBuilder;

use crate::{
    ChatProvider, ChatRequest, Completion, EmbeddingBackend, Error, Result, StreamingResponse,
};

/// A scripted chat provider
///
/// Returns queued responses in order; once the queue is drained the last
/// response repeats. With no responses queued, every call fails.
pub struct MockProvider {
    responses: Mutex<VecDeque<String>>,
    last: Mutex<Option<String>>,
    calls: AtomicUsize,
    tokens_per_call: u32,
    fail: bool,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    /// Create an empty provider (all calls fail until responses are queued)
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
            tokens_per_call: 42,
            fail: false,
        }
    }

    /// Create with a single canned response
    pub fn with_response(text: impl Into<String>) -> Self {
        let provider = Self::new();
        provider.push_response(text);
        provider
    }

    /// Create a provider whose every call fails
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    /// Queue an additional response
    pub fn push_response(&self, text: impl Into<String>) {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(text.into());
        }
    }

    /// Set the token count reported per completion
    pub fn with_tokens_per_call(mut self, tokens: u32) -> Self {
        self.tokens_per_call = tokens;
        self
    }

    /// Number of completion calls made so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_response(&self) -> Result<String> {
        if self.fail {
            return Err(Error::ProviderApi("mock provider failure".to_string()));
        }

        let mut queue = self
            .responses
            .lock()
            .map_err(|_| Error::Internal("mock response lock poisoned".to_string()))?;
        let mut last = self
            .last
            .lock()
            .map_err(|_| Error::Internal("mock response lock poisoned".to_string()))?;

        if let Some(text) = queue.pop_front() {
            *last = Some(text.clone());
            return Ok(text);
        }
        last.clone()
            .ok_or_else(|| Error::ProviderApi("mock provider has no responses".to_string()))
    }
}

#[async_trait]
impl ChatProvider for MockProvider {
    async fn complete(&self, _request: ChatRequest) -> Result<Completion> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let text = self.next_response()?;
        Ok(Completion {
            text,
            tokens_used: self.tokens_per_call,
        })
    }

    async fn stream_completion(&self, _request: ChatRequest) -> Result<StreamingResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let text = self.next_response()?;
        Ok(MockStreamBuilder::new().message(text).done().build())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// A deterministic embedding backend
///
/// Derives a small fixed-dimension vector from the text bytes, so equal
/// inputs always embed equally and distinct inputs almost never collide.
pub struct MockEmbeddings {
    dimensions: usize,
    calls: AtomicUsize,
    texts_embedded: AtomicUsize,
    unavailable_models: HashSet<String>,
}

impl Default for MockEmbeddings {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEmbeddings {
    /// Create with the default 8-dimension output
    pub fn new() -> Self {
        Self {
            dimensions: 8,
            calls: AtomicUsize::new(0),
            texts_embedded: AtomicUsize::new(0),
            unavailable_models: HashSet::new(),
        }
    }

    /// Create with a custom output dimension
    pub fn with_dimensions(dimensions: usize) -> Self {
        Self {
            dimensions,
            ..Self::new()
        }
    }

    /// Mark a model as unavailable so requests for it fail with a
    /// model-unavailable error
    pub fn with_unavailable_model(mut self, model: impl Into<String>) -> Self {
        self.unavailable_models.insert(model.into());
        self
    }

    /// Number of batch calls made so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Total number of texts sent across all batch calls
    pub fn texts_embedded(&self) -> usize {
        self.texts_embedded.load(Ordering::SeqCst)
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        // Cheap rolling hash per dimension slot
        let mut vector = vec![0.0f32; self.dimensions];
        for (i, byte) in text.bytes().enumerate() {
            let slot = i % self.dimensions;
            vector[slot] += byte as f32 / 255.0;
        }
        vector
    }
}

#[async_trait]
impl EmbeddingBackend for MockEmbeddings {
    async fn embed_batch(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.unavailable_models.contains(model) {
            return Err(Error::model_unavailable(model, "not available on this plan"));
        }

        self.texts_embedded.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }
}
