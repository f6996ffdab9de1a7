//! Bounded in-process cache tier (LRU + per-entry TTL)

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;

/// A cached value with its own expiry
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Serialized value (JSON)
    pub value: String,
    /// Instant after which the entry counts as a miss
    pub expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Bounded LRU cache with per-entry TTL
///
/// `get` reorders recency; inserting beyond capacity evicts the
/// least-recently-used entry. Expired entries are deleted lazily on `get`
/// and in bulk by [`MemoryTier::sweep_expired`].
pub struct MemoryTier {
    entries: Mutex<LruCache<String, CacheEntry>>,
}

impl MemoryTier {
    /// Create with a maximum entry count
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Get a value, treating expired entries as misses
    pub fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.is_expired() => {
                entries.pop(key);
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        }
    }

    /// Store a value with a TTL, evicting the LRU entry when full
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>, ttl: Duration) {
        let entry = CacheEntry {
            value: value.into(),
            expires_at: Instant::now() + ttl,
        };
        self.entries.lock().put(key.into(), entry);
    }

    /// Remove a single entry
    pub fn delete(&self, key: &str) {
        self.entries.lock().pop(key);
    }

    /// Remove all entries
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Remove all entries whose key starts with `prefix`
    pub fn clear_prefix(&self, prefix: &str) {
        let mut entries = self.entries.lock();
        let keys: Vec<String> = entries
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect();
        for key in keys {
            entries.pop(&key);
        }
    }

    /// Current entry count (including not-yet-swept expired entries)
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Check if the tier is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all expired entries, returning how many were removed
    pub fn sweep_expired(&self) -> usize {
        let mut entries = self.entries.lock();
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, e)| e.is_expired())
            .map(|(k, _)| k.clone())
            .collect();
        let count = expired.len();
        for key in expired {
            entries.pop(&key);
        }
        count
    }
}
