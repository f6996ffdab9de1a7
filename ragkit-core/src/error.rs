//! Error types for the ragkit pipeline

use thiserror::Error;

/// Result type alias using ragkit's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the ragkit pipeline
#[derive(Debug, Error)]
pub enum Error {
    // ============ Configuration Errors ============
    /// Non-recoverable misconfiguration (missing credentials etc.)
    ///
    /// This is the only error class that is raised at construction time;
    /// runtime backend failures degrade instead of propagating.
    #[error("Configuration error: {0}")]
    Config(String),

    // ============ Provider Errors ============
    /// Provider API error
    #[error("Provider API error: {0}")]
    ProviderApi(String),

    /// Provider authentication failed
    #[error("Provider authentication error: {0}")]
    ProviderAuth(String),

    /// Provider rate limit exceeded
    #[error("Provider rate limit exceeded: retry after {retry_after_secs}s")]
    ProviderRateLimit {
        /// Seconds to wait before retrying
        retry_after_secs: u64,
    },

    /// A specific model is unavailable (plan/access restriction, deprecation)
    ///
    /// Distinguished from [`Error::ProviderApi`] so the embedding service can
    /// walk its model fallback chain on this variant only.
    #[error("Model unavailable: {model} - {message}")]
    ModelUnavailable {
        /// Model that was requested
        model: String,
        /// Error message from the backend
        message: String,
    },

    // ============ Cache Errors ============
    /// Remote cache backend error (connection, command)
    #[error("Cache backend error: {0}")]
    CacheBackend(String),

    // ============ Validation Errors ============
    /// Validator returned output that could not be parsed as a verdict
    #[error("Validator parse error: {0}")]
    ValidatorParse(String),

    // ============ Streaming Errors ============
    /// Stream interrupted
    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    // ============ Serialization Errors ============
    /// JSON serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // ============ Network Errors ============
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // ============ System Errors ============
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ============ Generic Errors ============
    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Any other error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new model-unavailable error
    pub fn model_unavailable(model: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ModelUnavailable {
            model: model.into(),
            message: message.into(),
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ProviderRateLimit { .. } | Self::StreamInterrupted(_) | Self::Http(_)
        )
    }

    /// Check if this error indicates the requested model cannot be used,
    /// meaning a fallback model should be tried
    pub fn is_model_unavailable(&self) -> bool {
        matches!(self, Self::ModelUnavailable { .. })
    }
}
