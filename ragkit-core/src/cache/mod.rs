//! Multi-tier cache for the answer pipeline
//!
//! Two backends compose into one surface:
//!
//! - an optional remote key-value store (Redis/Valkey) consulted first, and
//! - an in-process bounded LRU+TTL tier that doubles as a write-through
//!   backup, so the cache stays functional when the remote tier is absent
//!   or failing.
//!
//! Remote failures are logged and swallowed; they never propagate to
//! callers. Categories are separate namespaces with independent capacity
//! limits and TTL defaults, isolating one workload's churn from another's.

pub mod fingerprint;
mod memory;

#[cfg(feature = "redis")]
mod redis_backend;

pub use memory::{CacheEntry, MemoryTier};

#[cfg(feature = "redis")]
pub use redis_backend::RedisTier;

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::Result;

/// Logical cache namespaces with independent limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheCategory {
    /// Text embedding vectors
    Embeddings,
    /// Retrieval result sets
    SearchResults,
    /// Generated chat answers
    ChatResponses,
}

impl CacheCategory {
    /// Namespace string used in remote keys
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheCategory::Embeddings => "embeddings",
            CacheCategory::SearchResults => "search-results",
            CacheCategory::ChatResponses => "chat-responses",
        }
    }

    /// All categories, in a fixed order
    pub fn all() -> [CacheCategory; 3] {
        [
            CacheCategory::Embeddings,
            CacheCategory::SearchResults,
            CacheCategory::ChatResponses,
        ]
    }

    fn index(&self) -> usize {
        match self {
            CacheCategory::Embeddings => 0,
            CacheCategory::SearchResults => 1,
            CacheCategory::ChatResponses => 2,
        }
    }
}

/// Per-category limits
#[derive(Debug, Clone)]
pub struct CategoryConfig {
    /// Maximum entry count for the in-process tier
    pub capacity: usize,
    /// TTL applied when `set` is called without an explicit one
    pub default_ttl: Duration,
}

/// Configuration for the cache manager
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Embedding vector cache limits
    pub embeddings: CategoryConfig,
    /// Search result cache limits
    pub search_results: CategoryConfig,
    /// Chat response cache limits
    pub chat_responses: CategoryConfig,
    /// Prefix for remote keys
    pub key_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            embeddings: CategoryConfig {
                capacity: 2000,
                default_ttl: Duration::from_secs(24 * 3600),
            },
            search_results: CategoryConfig {
                capacity: 500,
                default_ttl: Duration::from_secs(30 * 60),
            },
            chat_responses: CategoryConfig {
                capacity: 500,
                default_ttl: Duration::from_secs(3600),
            },
            key_prefix: "ragkit".to_string(),
        }
    }
}

impl CacheConfig {
    fn category(&self, category: CacheCategory) -> &CategoryConfig {
        match category {
            CacheCategory::Embeddings => &self.embeddings,
            CacheCategory::SearchResults => &self.search_results,
            CacheCategory::ChatResponses => &self.chat_responses,
        }
    }
}

/// Observability snapshot of the cache
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    /// Whether a remote tier is attached
    pub backend_enabled: bool,
    /// Entry count per category (in-process tier)
    pub category_sizes: Vec<(String, usize)>,
}

/// Multi-tier cache manager
///
/// Owned by the application's composition root and handed to the services
/// by `Arc` reference; there is no global instance.
pub struct CacheManager {
    config: CacheConfig,
    tiers: [MemoryTier; 3],
    #[cfg(feature = "redis")]
    remote: Option<RedisTier>,
    /// tag -> set of (category, key) for group invalidation
    tags: DashMap<String, HashSet<(CacheCategory, String)>>,
}

impl CacheManager {
    /// Create a cache manager with only the in-process tier
    pub fn new(config: CacheConfig) -> Self {
        let tiers = [
            MemoryTier::new(config.embeddings.capacity),
            MemoryTier::new(config.search_results.capacity),
            MemoryTier::new(config.chat_responses.capacity),
        ];
        Self {
            config,
            tiers,
            #[cfg(feature = "redis")]
            remote: None,
            tags: DashMap::new(),
        }
    }

    /// Attach a remote tier, falling back silently when unreachable
    ///
    /// A failed connection leaves the manager running on the in-process
    /// tier alone.
    #[cfg(feature = "redis")]
    pub async fn with_remote(mut self, url: &str) -> Self {
        match RedisTier::connect(url, self.config.key_prefix.clone()).await {
            Ok(tier) => {
                tracing::info!("Connected to remote cache at {}", url);
                self.remote = Some(tier);
            }
            Err(e) => {
                warn!("Remote cache unavailable, using in-process tier only: {}", e);
            }
        }
        self
    }

    fn tier(&self, category: CacheCategory) -> &MemoryTier {
        &self.tiers[category.index()]
    }

    fn remote_key(category: CacheCategory, key: &str) -> String {
        format!("{}:{}", category.as_str(), key)
    }

    /// Get a value, remote tier first, then in-process
    pub async fn get<T: DeserializeOwned>(&self, category: CacheCategory, key: &str) -> Option<T> {
        #[cfg(feature = "redis")]
        if let Some(remote) = &self.remote {
            match remote.get(&Self::remote_key(category, key)).await {
                Ok(Some(raw)) => match serde_json::from_str(&raw) {
                    Ok(value) => {
                        debug!(category = category.as_str(), key, "remote cache hit");
                        return Some(value);
                    }
                    Err(e) => warn!("Discarding undecodable remote cache entry: {}", e),
                },
                Ok(None) => {}
                Err(e) => warn!("Remote cache read failed, trying in-process tier: {}", e),
            }
        }

        let raw = self.tier(category).get(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => {
                debug!(category = category.as_str(), key, "in-process cache hit");
                Some(value)
            }
            Err(e) => {
                warn!("Discarding undecodable cache entry: {}", e);
                self.tier(category).delete(key);
                None
            }
        }
    }

    /// Store a value in both tiers
    ///
    /// The remote write is best-effort: its error is logged and dropped
    /// here, which is the whole "never throws from cache writes" contract.
    /// The in-process write always happens.
    pub async fn set<T: Serialize>(
        &self,
        category: CacheCategory,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Refusing to cache unserializable value: {}", e);
                return;
            }
        };
        let ttl = ttl.unwrap_or(self.config.category(category).default_ttl);

        #[cfg(feature = "redis")]
        if let Some(remote) = &self.remote {
            if let Err(e) = remote
                .set_ex(&Self::remote_key(category, key), &raw, ttl.as_secs().max(1))
                .await
            {
                warn!("Remote cache write failed (in-process tier still updated): {}", e);
            }
        }

        self.tier(category).set(key, raw, ttl);
    }

    /// Store a value and register it under invalidation tags
    pub async fn set_with_tags<T: Serialize>(
        &self,
        category: CacheCategory,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
        tags: &[&str],
    ) {
        self.set(category, key, value, ttl).await;
        for tag in tags {
            self.tags
                .entry((*tag).to_string())
                .or_default()
                .insert((category, key.to_string()));
        }
    }

    /// Delete a single entry from both tiers
    pub async fn delete(&self, category: CacheCategory, key: &str) {
        #[cfg(feature = "redis")]
        if let Some(remote) = &self.remote {
            if let Err(e) = remote.delete(&Self::remote_key(category, key)).await {
                warn!("Remote cache delete failed: {}", e);
            }
        }
        self.tier(category).delete(key);
    }

    /// Clear an entire category
    pub async fn clear(&self, category: CacheCategory) {
        #[cfg(feature = "redis")]
        if let Some(remote) = &self.remote {
            let pattern = format!("{}:*", category.as_str());
            if let Err(e) = remote.clear_pattern(&pattern).await {
                warn!("Remote cache clear failed: {}", e);
            }
        }
        self.tier(category).clear();
    }

    /// Clear entries in a category whose key starts with `prefix`
    pub async fn clear_prefix(&self, category: CacheCategory, prefix: &str) {
        #[cfg(feature = "redis")]
        if let Some(remote) = &self.remote {
            let pattern = format!("{}:{}*", category.as_str(), prefix);
            if let Err(e) = remote.clear_pattern(&pattern).await {
                warn!("Remote cache clear failed: {}", e);
            }
        }
        self.tier(category).clear_prefix(prefix);
    }

    /// Delete every entry registered under any of the given tags
    pub async fn invalidate_by_tags(&self, tags: &[&str]) {
        for tag in tags {
            if let Some((_, keys)) = self.tags.remove(*tag) {
                for (category, key) in keys {
                    self.delete(category, &key).await;
                }
            }
        }
    }

    /// Cache-aside: return the cached value or compute, store and return it
    ///
    /// No stampede protection: concurrent callers missing on the same key
    /// each compute and the last write wins. Cached values are pure
    /// functions of their key, so this is safe.
    pub async fn get_or_compute<T, F, Fut>(
        &self,
        category: CacheCategory,
        key: &str,
        ttl: Option<Duration>,
        compute: F,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(value) = self.get(category, key).await {
            return Ok(value);
        }
        let value = compute().await?;
        self.set(category, key, &value, ttl).await;
        Ok(value)
    }

    /// Snapshot of cache occupancy for observability
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            backend_enabled: self.backend_enabled(),
            category_sizes: CacheCategory::all()
                .iter()
                .map(|c| (c.as_str().to_string(), self.tier(*c).len()))
                .collect(),
        }
    }

    fn backend_enabled(&self) -> bool {
        #[cfg(feature = "redis")]
        {
            self.remote.is_some()
        }
        #[cfg(not(feature = "redis"))]
        {
            false
        }
    }

    /// Drop expired in-process entries across all categories
    ///
    /// Called by the background maintenance task; the remote tier expires
    /// keys on its own.
    pub fn sweep_expired(&self) -> usize {
        CacheCategory::all()
            .iter()
            .map(|c| self.tier(*c).sweep_expired())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> CacheManager {
        CacheManager::new(CacheConfig::default())
    }

    #[tokio::test]
    async fn test_round_trip_all_categories() {
        let cache = manager();
        for category in CacheCategory::all() {
            cache.set(category, "k", &vec![1u32, 2, 3], None).await;
            let got: Option<Vec<u32>> = cache.get(category, "k").await;
            assert_eq!(got, Some(vec![1, 2, 3]));
        }
    }

    #[tokio::test]
    async fn test_categories_are_isolated() {
        let cache = manager();
        cache
            .set(CacheCategory::Embeddings, "k", &"emb".to_string(), None)
            .await;
        let other: Option<String> = cache.get(CacheCategory::ChatResponses, "k").await;
        assert_eq!(other, None);
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let cache = manager();
        cache
            .set(
                CacheCategory::SearchResults,
                "k",
                &"v".to_string(),
                Some(Duration::ZERO),
            )
            .await;
        let got: Option<String> = cache.get(CacheCategory::SearchResults, "k").await;
        assert_eq!(got, None);
    }

    #[tokio::test]
    async fn test_get_or_compute_computes_once_on_hit() {
        let cache = manager();
        let computed = cache
            .get_or_compute(CacheCategory::Embeddings, "k", None, || async {
                Ok("fresh".to_string())
            })
            .await
            .unwrap();
        assert_eq!(computed, "fresh");

        // Second call must come from the cache, not the closure
        let cached: String = cache
            .get_or_compute(CacheCategory::Embeddings, "k", None, || async {
                panic!("should not recompute")
            })
            .await
            .unwrap();
        assert_eq!(cached, "fresh");
    }

    #[tokio::test]
    async fn test_invalidate_by_tags() {
        let cache = manager();
        cache
            .set_with_tags(
                CacheCategory::ChatResponses,
                "a",
                &"1".to_string(),
                None,
                &["assistant-7"],
            )
            .await;
        cache
            .set_with_tags(
                CacheCategory::ChatResponses,
                "b",
                &"2".to_string(),
                None,
                &["assistant-8"],
            )
            .await;

        cache.invalidate_by_tags(&["assistant-7"]).await;

        let a: Option<String> = cache.get(CacheCategory::ChatResponses, "a").await;
        let b: Option<String> = cache.get(CacheCategory::ChatResponses, "b").await;
        assert_eq!(a, None);
        assert_eq!(b, Some("2".to_string()));
    }

    #[tokio::test]
    async fn test_stats() {
        let cache = manager();
        cache
            .set(CacheCategory::Embeddings, "k", &"v".to_string(), None)
            .await;
        let stats = cache.stats();
        assert!(!stats.backend_enabled);
        assert!(stats
            .category_sizes
            .iter()
            .any(|(name, size)| name == "embeddings" && *size == 1));
    }
}
