//! Context-aware response cache
//!
//! Caches generated answers under a composite fingerprint (question
//! embedding + top context + recent history) so semantically similar
//! questions with different retrieved context never collide. Only
//! high-confidence answers are admitted; fallback answers are never cached,
//! so a bad answer cannot be entrenched for other users sharing the
//! fingerprint.

use std::num::NonZeroUsize;
use std::time::Duration;

use chrono::{DateTime, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::fingerprint::response_fingerprint;
use crate::message::Message;
use crate::rag::RetrievedPassage;

/// A source cited by a cached answer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceRef {
    /// Title of the source document
    pub document_name: String,
    /// Kind of source (e.g. "faq", "document", "website")
    pub document_type: String,
    /// Relevance score of this source for the question
    pub relevance_score: f32,
    /// Optional source URL
    pub url: Option<String>,
}

impl From<&RetrievedPassage> for SourceRef {
    fn from(passage: &RetrievedPassage) -> Self {
        Self {
            document_name: passage.title.clone(),
            document_type: passage.doc_type.clone(),
            relevance_score: passage.score,
            url: passage.url.clone(),
        }
    }
}

/// An answer admitted to the response cache
///
/// Immutable once stored; a refresh replaces the entry rather than
/// mutating it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedResponse {
    /// The generated answer text
    pub answer: String,
    /// Heuristic confidence at generation time
    pub confidence: f32,
    /// Sources the answer drew on, ordered by relevance
    pub sources_used: Vec<SourceRef>,
    /// Tokens consumed generating the answer
    pub tokens_used: u32,
    /// When the answer was generated
    pub created_at: DateTime<Utc>,
}

/// Configuration for the response cache
#[derive(Debug, Clone)]
pub struct ResponseCacheConfig {
    /// Maximum cached answers
    pub capacity: usize,
    /// TTL when the request carried conversation history
    ///
    /// Shorter, to keep multi-turn context fresh.
    pub ttl_with_history: Duration,
    /// TTL for standalone questions
    pub ttl_standalone: Duration,
    /// Minimum confidence for admission
    pub min_confidence: f32,
    /// Decimal places the question embedding is rounded to in the key
    ///
    /// A tolerance against embedding-model nondeterminism; tune against
    /// observed hit rates rather than treating the default as load-bearing.
    pub embedding_precision: u32,
}

impl Default for ResponseCacheConfig {
    fn default() -> Self {
        Self {
            capacity: 500,
            ttl_with_history: Duration::from_secs(10 * 60),
            ttl_standalone: Duration::from_secs(60 * 60),
            min_confidence: 0.7,
            embedding_precision: 4,
        }
    }
}

/// Bounded cache of generated answers keyed by composite fingerprint
pub struct ResponseCache {
    config: ResponseCacheConfig,
    entries: Mutex<LruCache<String, CachedResponse>>,
}

impl ResponseCache {
    /// Create with the given configuration
    pub fn new(config: ResponseCacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            config,
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Build the composite key for a request
    pub fn key(
        &self,
        embedding: &[f32],
        passages: &[RetrievedPassage],
        history: &[Message],
    ) -> String {
        response_fingerprint(embedding, passages, history, self.config.embedding_precision)
    }

    fn ttl_for(&self, has_history: bool) -> Duration {
        if has_history {
            self.config.ttl_with_history
        } else {
            self.config.ttl_standalone
        }
    }

    /// Look up a cached answer
    ///
    /// The TTL applied is a property of the request (history shortens it),
    /// not of the entry. An expired-but-present entry is a miss.
    pub fn get(&self, key: &str, has_history: bool) -> Option<CachedResponse> {
        let ttl = self.ttl_for(has_history);
        let mut entries = self.entries.lock();
        let entry = entries.get(key)?;
        let age = Utc::now().signed_duration_since(entry.created_at);
        let age_secs = age.num_seconds().max(0) as u64;
        if age_secs >= ttl.as_secs() {
            // Evict only once the entry is stale under every request shape;
            // a history-scoped miss must not discard an answer still valid
            // for standalone lookups.
            let max_ttl = self.config.ttl_standalone.max(self.config.ttl_with_history);
            if age_secs >= max_ttl.as_secs() {
                entries.pop(key);
            }
            return None;
        }
        debug!(key, "response cache hit");
        Some(entry.clone())
    }

    /// Store an answer, if its confidence clears the admission bar
    pub fn store(&self, key: &str, response: CachedResponse) {
        if response.confidence < self.config.min_confidence {
            debug!(
                confidence = response.confidence,
                "skipping response cache write below confidence threshold"
            );
            return;
        }
        self.entries.lock().put(key.to_string(), response);
    }

    /// Number of cached answers
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
