//! Retrieval interfaces
//!
//! This module defines the input contract for the answer pipeline. Retrieval
//! ranking itself (vector search) lives in the application layer; the
//! pipeline only consumes pre-retrieved passages.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A knowledge passage retrieved for a query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedPassage {
    /// Unique identifier
    pub id: String,
    /// Source document type (e.g. "faq", "document", "website")
    pub doc_type: String,
    /// Source document title
    pub title: String,
    /// The text content
    pub content: String,
    /// Relevance score (0.0 to 1.0)
    pub score: f32,
    /// Optional source URL
    pub url: Option<String>,
    /// Metadata associated with the passage
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl RetrievedPassage {
    /// Create a passage with the fields the pipeline requires
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
        score: f32,
    ) -> Self {
        Self {
            id: id.into(),
            doc_type: "document".to_string(),
            title: title.into(),
            content: content.into(),
            score,
            url: None,
            metadata: HashMap::new(),
        }
    }

    /// Set the document type
    pub fn with_doc_type(mut self, doc_type: impl Into<String>) -> Self {
        self.doc_type = doc_type.into();
        self
    }

    /// Set the source URL
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// Interface for retrieval providers
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Search for passages relevant to a query, ordered by score descending
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<RetrievedPassage>>;
}

/// Interface for embedding backends
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Generate embedding vectors for a batch of texts, in input order
    async fn embed_batch(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Generate an embedding vector for a single text
    async fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(model, &[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| crate::error::Error::ProviderApi("No embedding returned".to_string()))
    }
}
