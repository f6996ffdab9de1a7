//! Embedding service with caching, deduplication and model fallback
//!
//! Wraps an [`EmbeddingBackend`] with three layers of cost control:
//!
//! - per-text caching keyed by the normalized content hash,
//! - batch deduplication so identical content is embedded once, and
//! - a model fallback chain walked when a model is unavailable.
//!
//! When every model in the chain fails, the service degrades to zero
//! vectors instead of raising, so an embedding outage cannot halt
//! unrelated pipeline stages.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, warn};

use crate::cache::fingerprint::content_hash;
use crate::cache::{CacheCategory, CacheManager};
use crate::error::Result;
use crate::rag::EmbeddingBackend;

/// Configuration for the embedding service
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    /// Models tried in order; later entries are fallbacks
    pub model_chain: Vec<String>,
    /// Expected vector dimensionality (used for the zero-vector degrade)
    pub dimensions: usize,
    /// TTL for cached vectors
    pub cache_ttl: Duration,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_chain: vec![
                "text-embedding-3-small".to_string(),
                "text-embedding-3-large".to_string(),
                "text-embedding-ada-002".to_string(),
            ],
            dimensions: 1536,
            cache_ttl: Duration::from_secs(24 * 3600),
        }
    }
}

/// Embedding service with caching and batch deduplication
pub struct EmbeddingService {
    backend: Arc<dyn EmbeddingBackend>,
    cache: Arc<CacheManager>,
    config: EmbeddingConfig,
}

impl EmbeddingService {
    /// Create a new embedding service
    pub fn new(
        backend: Arc<dyn EmbeddingBackend>,
        cache: Arc<CacheManager>,
        config: EmbeddingConfig,
    ) -> Self {
        Self {
            backend,
            cache,
            config,
        }
    }

    /// Embed a single text, consulting the cache first
    ///
    /// Never fails: exhaustion of the model chain degrades to a zero vector.
    pub async fn embed(&self, text: &str) -> Vec<f32> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await;
        vectors.pop().unwrap_or_else(|| vec![0.0; self.config.dimensions])
    }

    /// Embed a batch of texts, deduplicating identical content
    ///
    /// Identical texts (after trim + lowercase) are embedded at most once;
    /// the resulting vector is broadcast to every original position. Output
    /// order matches input order.
    pub async fn embed_batch(&self, texts: &[String]) -> Vec<Vec<f32>> {
        if texts.is_empty() {
            return Vec::new();
        }

        // Group positions by content digest, keeping first-appearance order
        let digests: Vec<String> = texts.iter().map(|t| content_hash(t)).collect();
        let mut unique_digests: Vec<String> = Vec::new();
        let mut representative_text: Vec<String> = Vec::new();
        for (i, digest) in digests.iter().enumerate() {
            if !unique_digests.contains(digest) {
                unique_digests.push(digest.clone());
                representative_text.push(texts[i].clone());
            }
        }

        // Per-unique cache check
        let mut resolved: Vec<Option<Vec<f32>>> = vec![None; unique_digests.len()];
        for (i, digest) in unique_digests.iter().enumerate() {
            resolved[i] = self.cache.get(CacheCategory::Embeddings, digest).await;
        }

        // One backend call covering only the uncached uniques
        let missing: Vec<usize> = (0..resolved.len()).filter(|i| resolved[*i].is_none()).collect();
        if !missing.is_empty() {
            let to_embed: Vec<String> = missing.iter().map(|i| representative_text[*i].clone()).collect();
            debug!(
                total = texts.len(),
                unique = unique_digests.len(),
                uncached = to_embed.len(),
                "embedding batch"
            );

            match self.embed_with_fallback(&to_embed).await {
                Ok(vectors) => {
                    for (slot, vector) in missing.iter().zip(vectors) {
                        self.cache
                            .set(
                                CacheCategory::Embeddings,
                                &unique_digests[*slot],
                                &vector,
                                Some(self.config.cache_ttl),
                            )
                            .await;
                        resolved[*slot] = Some(vector);
                    }
                }
                Err(e) => {
                    // Deliberate availability-over-correctness choice: a full
                    // embedding outage must not block the rest of the pipeline.
                    error!(
                        "All embedding models failed, degrading to zero vectors: {}",
                        e
                    );
                    for slot in &missing {
                        resolved[*slot] = Some(vec![0.0; self.config.dimensions]);
                    }
                }
            }
        }

        // Broadcast back to original positions
        digests
            .iter()
            .map(|digest| {
                let idx = unique_digests
                    .iter()
                    .position(|d| d == digest)
                    .unwrap_or(0);
                resolved[idx]
                    .clone()
                    .unwrap_or_else(|| vec![0.0; self.config.dimensions])
            })
            .collect()
    }

    /// Walk the model chain until one call succeeds
    async fn embed_with_fallback(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut last_error = None;
        for model in &self.config.model_chain {
            match self.backend.embed_batch(model, texts).await {
                Ok(vectors) => return Ok(vectors),
                Err(e) if e.is_model_unavailable() => {
                    warn!("Embedding model {} unavailable, trying next: {}", model, e);
                    last_error = Some(e);
                }
                Err(e) => {
                    warn!("Embedding call with {} failed, trying next: {}", model, e);
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| {
            crate::error::Error::Config("Empty embedding model chain".to_string())
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Backend that derives a vector from text length and counts texts sent
    struct CountingBackend {
        texts_sent: AtomicUsize,
        calls: AtomicUsize,
    }

    impl CountingBackend {
        fn new() -> Self {
            Self {
                texts_sent: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl EmbeddingBackend for CountingBackend {
        async fn embed_batch(&self, _model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.texts_sent.fetch_add(texts.len(), Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|t| vec![t.trim().to_lowercase().len() as f32, 1.0])
                .collect())
        }
    }

    /// Backend where the first N models are unavailable
    struct FallbackBackend {
        unavailable_models: Vec<String>,
        used_model: parking_lot::Mutex<Option<String>>,
    }

    #[async_trait]
    impl EmbeddingBackend for FallbackBackend {
        async fn embed_batch(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            if self.unavailable_models.iter().any(|m| m == model) {
                return Err(crate::error::Error::model_unavailable(model, "no access"));
            }
            *self.used_model.lock() = Some(model.to_string());
            Ok(texts.iter().map(|_| vec![1.0, 2.0]).collect())
        }
    }

    fn service(backend: Arc<dyn EmbeddingBackend>) -> EmbeddingService {
        let config = EmbeddingConfig {
            dimensions: 2,
            ..Default::default()
        };
        EmbeddingService::new(backend, Arc::new(CacheManager::new(CacheConfig::default())), config)
    }

    #[tokio::test]
    async fn test_batch_dedup_sends_one_representative() {
        let backend = Arc::new(CountingBackend::new());
        let svc = service(backend.clone());

        let texts = vec![
            "Hello World".to_string(),
            "  hello world  ".to_string(),
            "different".to_string(),
        ];
        let vectors = svc.embed_batch(&texts).await;

        assert_eq!(vectors.len(), 3);
        // Normalized duplicates share one vector, in original order
        assert_eq!(vectors[0], vectors[1]);
        assert_ne!(vectors[0], vectors[2]);
        // Only 2 unique texts hit the backend
        assert_eq!(backend.texts_sent.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_single_embed_hits_cache_second_time() {
        let backend = Arc::new(CountingBackend::new());
        let svc = service(backend.clone());

        let first = svc.embed("What is Rust?").await;
        let second = svc.embed("what is rust?").await;

        assert_eq!(first, second);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_model_fallback_chain() {
        let backend = Arc::new(FallbackBackend {
            unavailable_models: vec!["text-embedding-3-small".to_string()],
            used_model: parking_lot::Mutex::new(None),
        });
        let svc = service(backend.clone());

        let vector = svc.embed("hello").await;
        assert_eq!(vector, vec![1.0, 2.0]);
        assert_eq!(
            backend.used_model.lock().as_deref(),
            Some("text-embedding-3-large")
        );
    }

    #[tokio::test]
    async fn test_exhausted_chain_degrades_to_zero_vector() {
        let backend = Arc::new(FallbackBackend {
            unavailable_models: vec![
                "text-embedding-3-small".to_string(),
                "text-embedding-3-large".to_string(),
                "text-embedding-ada-002".to_string(),
            ],
            used_model: parking_lot::Mutex::new(None),
        });
        let svc = service(backend);

        let vector = svc.embed("hello").await;
        assert_eq!(vector, vec![0.0, 0.0]);
    }
}
