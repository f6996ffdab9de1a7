//! Remote cache tier backed by Redis/Valkey
//!
//! Any key-value store with TTL support satisfies the contract the
//! [`crate::cache::CacheManager`] needs: GET, SET EX, DEL and KEYS. Errors
//! from this tier are surfaced as [`Error::CacheBackend`] and are swallowed
//! (logged, never propagated) by the manager.

use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::error::{Error, Result};

/// Remote cache tier over a Redis-compatible server
#[derive(Clone)]
pub struct RedisTier {
    conn: ConnectionManager,
    key_prefix: String,
}

impl RedisTier {
    /// Connect to a Redis/Valkey server
    ///
    /// Fails only on an invalid URL or unreachable server at startup; the
    /// connection manager reconnects on its own afterwards.
    pub async fn connect(url: &str, key_prefix: impl Into<String>) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| Error::CacheBackend(format!("invalid URL: {}", e)))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| Error::CacheBackend(format!("connection failed: {}", e)))?;
        Ok(Self {
            conn,
            key_prefix: key_prefix.into(),
        })
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}:{}", self.key_prefix, key)
    }

    /// Get a value by key
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        conn.get(self.full_key(key))
            .await
            .map_err(|e| Error::CacheBackend(format!("GET failed: {}", e)))
    }

    /// Store a value with a TTL in seconds
    pub async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(self.full_key(key), value, ttl_secs)
            .await
            .map_err(|e| Error::CacheBackend(format!("SET failed: {}", e)))?;
        Ok(())
    }

    /// Delete a key
    pub async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .del(self.full_key(key))
            .await
            .map_err(|e| Error::CacheBackend(format!("DEL failed: {}", e)))?;
        Ok(())
    }

    /// Delete all keys matching a glob pattern (prefix-scoped)
    pub async fn clear_pattern(&self, pattern: &str) -> Result<usize> {
        let mut conn = self.conn.clone();
        let keys: Vec<String> = conn
            .keys(self.full_key(pattern))
            .await
            .map_err(|e| Error::CacheBackend(format!("KEYS failed: {}", e)))?;
        if keys.is_empty() {
            return Ok(0);
        }
        let count = keys.len();
        let _: () = conn
            .del(keys)
            .await
            .map_err(|e| Error::CacheBackend(format!("DEL failed: {}", e)))?;
        Ok(count)
    }
}
