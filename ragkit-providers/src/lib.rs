//! # RAGKIT Providers
//!
//! Chat-completion and embedding backend implementations for the RAGKIT
//! answer engine.

#![warn(missing_docs)]

// Re-export core types for convenience
pub use ragkit_core::error::{Error, Result};
pub use ragkit_core::message::Message;
pub use ragkit_core::provider::{ChatProvider, ChatRequest, Completion};
pub use ragkit_core::rag::EmbeddingBackend;
pub use ragkit_core::streaming::{StreamingChoice, StreamingResponse};

pub mod mock;
pub mod utils;

#[cfg(feature = "openai")]
pub mod openai;

/// HTTP client configuration
#[derive(Clone)]
pub struct HttpConfig {
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Connection pool idle timeout
    pub pool_idle_timeout_secs: u64,
    /// Max idle connections per host
    pub pool_max_idle_per_host: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            pool_idle_timeout_secs: 90,
            pool_max_idle_per_host: 32,
        }
    }
}

impl HttpConfig {
    /// Build a reqwest client
    pub fn build_client(&self) -> Result<reqwest::Client> {
        use std::time::Duration;

        reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .pool_idle_timeout(Duration::from_secs(self.pool_idle_timeout_secs))
            .pool_max_idle_per_host(self.pool_max_idle_per_host)
            .build()
            .map_err(|e| Error::Internal(e.to_string()))
    }
}
