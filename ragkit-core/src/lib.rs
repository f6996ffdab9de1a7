//! # RAGKIT Core
//!
//! Core pipeline for the RAGKIT answer engine.
//!
//! This crate provides:
//! - Multi-tier caching (`cache`) - remote + in-process LRU/TTL tiers
//! - Embeddings (`embedding`) - cached, deduplicated, fallback-chained
//! - Answer generation (`answer`) - RAG prompting, confidence, follow-ups
//! - Response cache (`response_cache`) - context-aware composite keys
//! - Validation (`validator`) - grounding fact-check gate
//! - Rate limiting (`rate_limit`) - sliding-window limiter
//! - Maintenance (`maintenance`) - periodic expiry sweeps

#![warn(missing_docs)]

pub mod answer;
pub mod cache;
pub mod embedding;
pub mod error;
pub mod logging;
pub mod maintenance;
pub mod message;
pub mod provider;
pub mod rag;
pub mod rate_limit;
pub mod response_cache;
pub mod streaming;
pub mod validator;

/// Prelude - commonly used types
pub mod prelude {
    pub use crate::answer::{AnswerConfig, AnswerOptions, AnswerService, GeneratedAnswer, Language};
    pub use crate::cache::{CacheCategory, CacheConfig, CacheManager, CacheStats};
    pub use crate::embedding::{EmbeddingConfig, EmbeddingService};
    pub use crate::error::{Error, Result};
    pub use crate::message::{Message, Role};
    pub use crate::provider::{ChatProvider, ChatRequest, Completion};
    pub use crate::rag::{EmbeddingBackend, RetrievedPassage, Retriever};
    pub use crate::response_cache::{CachedResponse, ResponseCache, ResponseCacheConfig, SourceRef};
    pub use crate::streaming::{StreamingChoice, StreamingResponse};
    pub use crate::validator::{ResponseValidator, ValidationResult, ValidatorConfig};
}
