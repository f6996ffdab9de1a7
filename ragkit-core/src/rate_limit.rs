//! Sliding-window rate limiter
//!
//! Per-key request timestamps; only timestamps within the trailing window
//! count. Old entries are pruned lazily on each check and in bulk by the
//! background maintenance task.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Configuration for the rate limiter
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Sliding window length
    pub window: Duration,
    /// Maximum requests per key within the window
    pub max_requests: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            max_requests: 30,
        }
    }
}

/// Sliding-window limiter keyed by caller identity
pub struct RateLimiter {
    config: RateLimitConfig,
    requests: DashMap<String, VecDeque<Instant>>,
}

impl RateLimiter {
    /// Create with the given configuration
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            requests: DashMap::new(),
        }
    }

    /// Check and record a request; returns false when the key is over limit
    pub fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut timestamps = self.requests.entry(key.to_string()).or_default();

        while let Some(front) = timestamps.front() {
            if now.duration_since(*front) >= self.config.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }

        if timestamps.len() >= self.config.max_requests {
            return false;
        }
        timestamps.push_back(now);
        true
    }

    /// Requests left in the current window for a key
    pub fn remaining(&self, key: &str) -> usize {
        let now = Instant::now();
        self.requests
            .get(key)
            .map(|ts| {
                let in_window = ts
                    .iter()
                    .filter(|t| now.duration_since(**t) < self.config.window)
                    .count();
                self.config.max_requests.saturating_sub(in_window)
            })
            .unwrap_or(self.config.max_requests)
    }

    /// Drop keys with no activity inside the window, returning how many
    ///
    /// Called periodically by the maintenance task to bound memory.
    pub fn prune_idle(&self) -> usize {
        let now = Instant::now();
        let window = self.config.window;
        let before = self.requests.len();
        self.requests.retain(|_, timestamps| {
            timestamps
                .back()
                .map(|last| now.duration_since(*last) < window)
                .unwrap_or(false)
        });
        before - self.requests.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max: usize) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            window: Duration::from_secs(60),
            max_requests: max,
        })
    }

    #[test]
    fn test_admits_up_to_limit() {
        let limiter = limiter(3);
        assert!(limiter.check("tenant-1"));
        assert!(limiter.check("tenant-1"));
        assert!(limiter.check("tenant-1"));
        assert!(!limiter.check("tenant-1"));
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = limiter(1);
        assert!(limiter.check("a"));
        assert!(limiter.check("b"));
        assert!(!limiter.check("a"));
    }

    #[test]
    fn test_remaining() {
        let limiter = limiter(5);
        assert_eq!(limiter.remaining("t"), 5);
        limiter.check("t");
        limiter.check("t");
        assert_eq!(limiter.remaining("t"), 3);
    }

    #[test]
    fn test_window_prunes_old_entries() {
        let limiter = RateLimiter::new(RateLimitConfig {
            window: Duration::ZERO,
            max_requests: 1,
        });
        // With a zero window every previous timestamp is immediately stale
        assert!(limiter.check("t"));
        assert!(limiter.check("t"));
        assert_eq!(limiter.prune_idle(), 1);
    }
}
