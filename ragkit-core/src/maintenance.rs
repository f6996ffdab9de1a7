//! Background maintenance tasks for resource cleanup

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::CacheManager;
use crate::rate_limit::RateLimiter;

/// Configuration for background tasks
#[derive(Debug, Clone)]
pub struct MaintenanceConfig {
    /// Interval for the cache expiry sweep (in seconds)
    pub cache_sweep_interval_secs: u64,
    /// Interval for rate limiter pruning (in seconds)
    pub rate_limit_prune_interval_secs: u64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            cache_sweep_interval_secs: 300, // 5 minutes
            rate_limit_prune_interval_secs: 300,
        }
    }
}

/// Manager for background maintenance tasks
///
/// Lifecycle is explicit: the composition root starts the sweeps at process
/// start and calls [`MaintenanceManager::shutdown`] on exit. Capacity-based
/// eviction bounds memory between sweeps regardless of cadence.
pub struct MaintenanceManager {
    tasks: Vec<JoinHandle<()>>,
}

impl MaintenanceManager {
    /// Create a new maintenance manager
    pub fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    /// Start the periodic cache expiry sweep
    pub fn start_cache_sweep(&mut self, cache: Arc<CacheManager>, config: MaintenanceConfig) {
        let handle = tokio::spawn(async move {
            let interval = Duration::from_secs(config.cache_sweep_interval_secs);
            loop {
                tokio::time::sleep(interval).await;
                let removed = cache.sweep_expired();
                debug!(removed, "cache expiry sweep finished");
            }
        });
        self.tasks.push(handle);
    }

    /// Start periodic rate limiter pruning
    pub fn start_rate_limit_prune(
        &mut self,
        limiter: Arc<RateLimiter>,
        config: MaintenanceConfig,
    ) {
        let handle = tokio::spawn(async move {
            let interval = Duration::from_secs(config.rate_limit_prune_interval_secs);
            loop {
                tokio::time::sleep(interval).await;
                let removed = limiter.prune_idle();
                debug!(removed, "rate limiter prune finished");
            }
        });
        self.tasks.push(handle);
    }

    /// Shutdown all background tasks
    pub async fn shutdown(self) {
        info!("Shutting down {} background maintenance tasks", self.tasks.len());
        for task in self.tasks {
            task.abort();
        }
        info!("All maintenance tasks stopped");
    }
}

impl Default for MaintenanceManager {
    fn default() -> Self {
        Self::new()
    }
}
