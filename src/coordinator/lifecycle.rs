// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Cache lifecycle: open and shutdown.

use tracing::{debug, info};

use crate::config::CacheConfig;

use super::{CacheError, CacheManager, CacheManagerBuilder};

impl CacheManager {
    /// Start building a manager from `config`.
    #[must_use]
    pub fn builder(config: CacheConfig) -> CacheManagerBuilder {
        CacheManagerBuilder::new(config)
    }

    /// Open a cache with the default backends for every enabled tier.
    ///
    /// Returns as soon as the fast tiers are usable. The structured tier
    /// keeps opening in the background; until it is ready, reads skip it
    /// and writes targeting it wait.
    ///
    /// Must be called inside a tokio runtime.
    pub async fn open(config: CacheConfig) -> Result<Self, CacheError> {
        Self::builder(config).build().await
    }

    /// Whether the background expiry sweep is running.
    #[must_use]
    pub fn has_cleanup(&self) -> bool {
        self.cleanup.lock().as_ref().is_some_and(|handle| handle.is_running())
    }

    /// Stop the background sweep and wait for it to exit.
    ///
    /// Cached data is left in place. Calling this twice is a no-op.
    pub async fn shutdown(&self) {
        let handle = self.cleanup.lock().take();
        match handle {
            Some(handle) => {
                info!("Stopping cleanup scheduler");
                handle.shutdown().await;
                info!("Cache shutdown complete");
            }
            None => debug!("Shutdown requested with no cleanup scheduler running"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::traits::{TierLevel, TierStatus};

    fn memory_only(cleanup_interval_secs: u64) -> CacheConfig {
        CacheConfig {
            disabled_tiers: vec![TierLevel::Local, TierLevel::StructuredDb],
            cleanup_interval_secs,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_shutdown_stops_cleanup() {
        let cache = CacheManager::open(memory_only(60)).await.unwrap();
        assert!(cache.has_cleanup());

        cache.shutdown().await;
        assert!(!cache.has_cleanup());

        // Second call is harmless
        cache.shutdown().await;
    }

    #[tokio::test]
    async fn test_zero_interval_disables_cleanup() {
        let cache = CacheManager::open(memory_only(0)).await.unwrap();
        assert!(!cache.has_cleanup());
    }

    #[tokio::test]
    async fn test_disabled_tiers_report_disabled() {
        let cache = CacheManager::open(memory_only(0)).await.unwrap();
        let status = cache.tier_status();

        assert_eq!(status[0], (TierLevel::Memory, TierStatus::Ready));
        assert_eq!(status[1], (TierLevel::Session, TierStatus::Ready));
        assert_eq!(status[2], (TierLevel::Local, TierStatus::Disabled));
        assert_eq!(status[3], (TierLevel::StructuredDb, TierStatus::Disabled));
        assert!(!cache.is_available(TierLevel::Local));
    }
}
