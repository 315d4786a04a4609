// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Tier whose backing store opens asynchronously.
//!
//! Construction returns immediately and the open runs in a background task.
//! Until it settles, reads report [`TierError::Unavailable`] (so lookups skip
//! the tier instead of stalling) while writes wait for the outcome. A failed
//! open leaves the tier permanently unavailable.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{error, info};

use crate::cache_item::CacheItem;
use super::traits::{CacheTier, PutReceipt, TierError, TierLevel, TierStatus};

/// Open progress of a deferred tier.
#[derive(Clone)]
pub enum OpenState {
    Opening,
    Ready(Arc<dyn CacheTier>),
    Unavailable(String),
}

impl OpenState {
    fn is_settled(&self) -> bool {
        !matches!(self, OpenState::Opening)
    }
}

pub struct DeferredTier {
    level: TierLevel,
    state: watch::Receiver<OpenState>,
}

impl DeferredTier {
    /// Start opening in the background. Must be called inside a tokio runtime.
    pub fn spawn<F, T>(level: TierLevel, open: F) -> Self
    where
        F: Future<Output = Result<T, TierError>> + Send + 'static,
        T: CacheTier + 'static,
    {
        let (tx, rx) = watch::channel(OpenState::Opening);

        tokio::spawn(async move {
            let state = match open.await {
                Ok(tier) => {
                    info!(level = %level, "Deferred tier ready");
                    OpenState::Ready(Arc::new(tier))
                }
                Err(e) => {
                    error!(level = %level, error = %e, "Deferred tier failed to open, disabling it");
                    OpenState::Unavailable(e.to_string())
                }
            };
            // No receivers left means the cache was dropped mid-open
            let _ = tx.send(state);
        });

        Self { level, state: rx }
    }

    /// Current state without waiting.
    #[must_use]
    pub fn state(&self) -> OpenState {
        self.state.borrow().clone()
    }

    fn current(&self) -> Option<Arc<dyn CacheTier>> {
        match &*self.state.borrow() {
            OpenState::Ready(tier) => Some(tier.clone()),
            _ => None,
        }
    }

    /// Wait for the open to settle.
    async fn settled(&self) -> Option<Arc<dyn CacheTier>> {
        let mut rx = self.state.clone();
        let result = match rx.wait_for(OpenState::is_settled).await {
            Ok(state) => match &*state {
                OpenState::Ready(tier) => Some(tier.clone()),
                _ => None,
            },
            // Sender gone without settling: the open task panicked
            Err(_) => None,
        };
        result
    }

    async fn writable(&self) -> Result<Arc<dyn CacheTier>, TierError> {
        self.settled().await.ok_or(TierError::Unavailable(self.level))
    }

    fn readable(&self) -> Result<Arc<dyn CacheTier>, TierError> {
        self.current().ok_or(TierError::Unavailable(self.level))
    }
}

#[async_trait]
impl CacheTier for DeferredTier {
    fn level(&self) -> TierLevel {
        self.level
    }

    fn is_available(&self) -> bool {
        self.current().is_some()
    }

    fn status(&self) -> TierStatus {
        match &*self.state.borrow() {
            OpenState::Opening => TierStatus::Opening,
            OpenState::Ready(_) => TierStatus::Ready,
            OpenState::Unavailable(_) => TierStatus::Unavailable,
        }
    }

    async fn ready(&self) -> bool {
        self.settled().await.is_some()
    }

    async fn get(&self, key: &str) -> Result<Option<CacheItem>, TierError> {
        self.readable()?.get(key).await
    }

    async fn put(&self, key: &str, item: &CacheItem) -> Result<PutReceipt, TierError> {
        self.writable().await?.put(key, item).await
    }

    async fn delete(&self, key: &str) -> Result<(), TierError> {
        self.writable().await?.delete(key).await
    }

    async fn clear(&self) -> Result<(), TierError> {
        self.writable().await?.clear().await
    }

    async fn record_access(&self, key: &str, item: &CacheItem) -> Result<(), TierError> {
        self.readable()?.record_access(key, item).await
    }

    async fn evict_for_quota(&self, fraction: f64) -> Result<usize, TierError> {
        self.writable().await?.evict_for_quota(fraction).await
    }

    async fn purge_expired(&self, now: i64) -> Result<usize, TierError> {
        self.readable()?.purge_expired(now).await
    }

    async fn usage_bytes(&self) -> Result<usize, TierError> {
        self.readable()?.usage_bytes().await
    }
}
