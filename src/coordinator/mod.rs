// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Cache manager.
//!
//! The [`CacheManager`] is the façade that ties together all components:
//! - Memory tier with an LRU byte ceiling
//! - Session and durable local string tiers with quota recovery
//! - SQLite structured tier, opened in the background
//! - Frequency-based promotion toward memory
//! - Metrics and the background expiry sweep
//!
//! # Read path
//!
//! ```text
//! memory → session → local → structured-db → miss
//!            │         │          │
//!            └─────────┴──────────┴── hot items copied toward memory
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use tiered_cache::{CacheManager, CacheConfig, SetOptions, TierLevel};
//! use serde_json::json;
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), tiered_cache::CacheError> {
//! let cache = CacheManager::open(CacheConfig::default()).await?;
//!
//! cache.set("user:42", &json!({"name": "Ada"})).await?;
//! let user: Option<serde_json::Value> = cache.get("user:42").await;
//! assert!(user.is_some());
//!
//! let opts = SetOptions::at(TierLevel::StructuredDb).with_ttl(Duration::from_secs(3600));
//! cache.set_with("report:2024", &vec![1, 2, 3], opts).await?;
//! # Ok(())
//! # }
//! ```

mod types;
mod api;
mod builder;
mod lifecycle;

pub use types::{CacheError, ItemLocation};
pub use builder::CacheManagerBuilder;

use std::sync::Arc;
use std::time::Instant;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache_item::{now_millis, CacheItem};
use crate::cleanup::CleanupHandle;
use crate::collector::MetricsCollector;
use crate::config::CacheConfig;
use crate::eviction::promotion::PromotionPolicy;
use crate::set_options::SetOptions;
use crate::storage::traits::{CacheTier, PutReceipt, TierError, TierLevel};

/// Multi-tier cache.
///
/// # Thread Safety
///
/// The manager is `Send + Sync`; share it as `Arc<CacheManager>`.
/// Counters are atomics and each tier guards its own storage.
pub struct CacheManager {
    pub(super) config: CacheConfig,

    /// Tier per level, indexed by `TierLevel::index()`. `None` = disabled.
    pub(super) tiers: [Option<Arc<dyn CacheTier>>; 4],

    pub(super) collector: Arc<MetricsCollector>,

    pub(super) promotion: PromotionPolicy,

    /// Background expiry sweep, if running
    pub(super) cleanup: parking_lot::Mutex<Option<CleanupHandle>>,
}

impl CacheManager {
    #[must_use]
    pub fn tier(&self, level: TierLevel) -> Option<&Arc<dyn CacheTier>> {
        self.tiers[level.index()].as_ref()
    }

    fn emit_metrics(&self) -> bool {
        self.config.enable_metrics
    }

    fn record_tier_error(&self, level: TierLevel, operation: &str, error: &TierError) {
        self.collector.record_error();
        if self.emit_metrics() {
            crate::metrics::record_error(level.as_str(), operation, error.kind());
        }
    }

    fn record_put(&self, level: TierLevel, receipt: PutReceipt) {
        self.collector.record_evictions(receipt.evicted);
        if receipt.evicted > 0 && self.emit_metrics() {
            crate::metrics::record_eviction(level.as_str(), receipt.evicted, receipt.evicted_bytes);
        }
    }

    /// Write `item`, running one quota recovery pass and a single retry if
    /// the tier reports it is full.
    async fn put_with_recovery(
        &self,
        tier: &Arc<dyn CacheTier>,
        key: &str,
        item: &CacheItem,
    ) -> Result<PutReceipt, TierError> {
        let level = tier.level();
        match tier.put(key, item).await {
            Err(TierError::QuotaExceeded { needed, capacity, .. }) => {
                let evicted = tier.evict_for_quota(self.config.quota_eviction_fraction).await?;
                self.collector.record_evictions(evicted);
                if self.emit_metrics() {
                    crate::metrics::record_eviction(level.as_str(), evicted, 0);
                }
                debug!(tier = %level, needed, capacity, evicted, "Retrying write after quota recovery");

                let retried = tier.put(key, item).await;
                if self.emit_metrics() {
                    crate::metrics::record_quota_recovery(level.as_str(), retried.is_ok());
                }
                retried
            }
            other => other,
        }
    }

    // --- Core Operations ---

    /// Store `data` in the memory tier with the configured default TTL.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, data: &T) -> Result<(), CacheError> {
        self.set_with(key, data, SetOptions::default()).await
    }

    /// Store `data` with an explicit TTL and/or target tier.
    ///
    /// On success the key is dropped from every other tier, so a later read
    /// cannot fall through to a copy this write replaced. Failures
    /// are counted in `errors` and returned; a full session or local store
    /// gets one recovery pass and retry first.
    #[tracing::instrument(skip(self, data, options), fields(tier = %options.level))]
    pub async fn set_with<T: Serialize + ?Sized>(
        &self,
        key: &str,
        data: &T,
        options: SetOptions,
    ) -> Result<(), CacheError> {
        let _timer = self
            .emit_metrics()
            .then(|| crate::metrics::LatencyTimer::new(options.level.as_str(), "set"));

        let result = self.write(key, data, options).await;
        if let Err(ref e) = result {
            self.collector.record_error();
            warn!(key, tier = %options.level, error = %e, "Cache write failed");
            if self.emit_metrics() {
                crate::metrics::record_operation(options.level.as_str(), "set", "error");
                crate::metrics::record_error(options.level.as_str(), "set", e.kind());
            }
        }
        result
    }

    async fn write<T: Serialize + ?Sized>(
        &self,
        key: &str,
        data: &T,
        options: SetOptions,
    ) -> Result<(), CacheError> {
        let level = options.level;
        let value = serde_json::to_value(data)?;

        let ttl_ms = options.ttl_ms(self.config.default_ttl_ms);
        if ttl_ms == 0 {
            return Err(CacheError::InvalidTtl);
        }

        let tier = self.tier(level).ok_or(CacheError::TierUnavailable(level))?;
        if !tier.ready().await {
            return Err(CacheError::TierUnavailable(level));
        }

        let item = CacheItem::new(value, ttl_ms, now_millis());
        let receipt = self
            .put_with_recovery(tier, key, &item)
            .await
            .map_err(|e| CacheError::tier(level, e))?;
        self.record_put(level, receipt);

        // Older copies anywhere else would resurface once this one expires
        for other in TierLevel::ALL.into_iter().filter(|l| *l != level) {
            let Some(tier) = self.tier(other) else {
                continue;
            };
            match tier.delete(key).await {
                Ok(()) | Err(TierError::Unavailable(_)) => {}
                Err(e) => {
                    warn!(key, tier = %other, error = %e, "Failed to invalidate other tier");
                    self.record_tier_error(other, "invalidate", &e);
                }
            }
        }

        debug!(key, tier = %level, ttl_ms, size = item.size, "Cached item");
        if self.emit_metrics() {
            crate::metrics::record_operation(level.as_str(), "set", "success");
        }
        Ok(())
    }

    /// Look `key` up, fastest tier first.
    ///
    /// Returns `None` on a miss, and also when every tier holding the key
    /// failed, held an expired or unreadable entry, or held a value that
    /// does not decode into `T`. Expired and unreadable entries are deleted
    /// as they are found.
    #[tracing::instrument(skip(self), fields(tier))]
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let start = Instant::now();
        self.collector.record_request();
        let now = now_millis();

        let mut found = None;
        for level in TierLevel::ALL {
            let Some(tier) = self.tier(level) else {
                continue;
            };
            if !tier.is_available() {
                continue;
            }

            match tier.get(key).await {
                Ok(None) => {}
                Ok(Some(item)) if !item.is_valid_at(now) => {
                    debug!(key, tier = %level, "Expired entry dropped");
                    if let Err(e) = tier.delete(key).await {
                        self.record_tier_error(level, "delete", &e);
                    } else if self.emit_metrics() {
                        crate::metrics::record_expired(level.as_str(), 1);
                    }
                }
                Ok(Some(item)) => {
                    found = Some((level, item));
                    break;
                }
                Err(TierError::Deserialization { reason, .. }) => {
                    warn!(key, tier = %level, reason = %reason, "Unreadable entry dropped");
                    if self.emit_metrics() {
                        crate::metrics::record_corruption(level.as_str());
                    }
                    if let Err(e) = tier.delete(key).await {
                        self.record_tier_error(level, "delete", &e);
                    }
                }
                Err(e) => {
                    warn!(key, tier = %level, error = %e, "Tier lookup failed");
                    self.record_tier_error(level, "get", &e);
                }
            }
        }

        let result = match found {
            Some((level, item)) => self.serve_hit(key, level, item, now).await,
            None => None,
        };

        if result.is_none() {
            tracing::Span::current().record("tier", "miss");
            self.collector.record_miss();
            if self.emit_metrics() {
                crate::metrics::record_operation("all", "get", "miss");
            }
        }
        self.collector
            .record_response_time(start.elapsed().as_secs_f64() * 1000.0);
        if self.emit_metrics() {
            crate::metrics::set_hit_rate(self.collector.hit_rate());
        }
        result
    }

    async fn serve_hit<T: DeserializeOwned>(
        &self,
        key: &str,
        level: TierLevel,
        mut item: CacheItem,
        now: i64,
    ) -> Option<T> {
        let value = match <T as serde::Deserialize>::deserialize(&item.data) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, tier = %level, error = %e, "Cached value does not match requested type");
                self.collector.record_error();
                if self.emit_metrics() {
                    crate::metrics::record_error(level.as_str(), "get", "type_mismatch");
                }
                return None;
            }
        };

        item.touch(now);
        if let Some(tier) = self.tier(level) {
            if let Err(e) = tier.record_access(key, &item).await {
                debug!(key, tier = %level, error = %e, "Failed to persist access count");
                self.record_tier_error(level, "record_access", &e);
            }
        }

        if level != TierLevel::Memory {
            self.promote(key, &item, level).await;
        }

        tracing::Span::current().record("tier", level.as_str());
        debug!(key, tier = %level, access_count = item.access_count, "Cache hit");
        self.collector.record_hit(level);
        if self.emit_metrics() {
            crate::metrics::record_operation(level.as_str(), "get", "hit");
        }
        Some(value)
    }

    /// Copy a hot item into every available faster tier.
    async fn promote(&self, key: &str, item: &CacheItem, from: TierLevel) {
        for target in self.promotion.promotion_path(from, item.access_count) {
            let Some(tier) = self.tier(target) else {
                continue;
            };
            if !tier.is_available() {
                continue;
            }
            match self.put_with_recovery(tier, key, item).await {
                Ok(receipt) => {
                    self.record_put(target, receipt);
                    debug!(key, from = %from, to = %target, access_count = item.access_count, "Promoted item");
                    if self.emit_metrics() {
                        crate::metrics::record_promotion(from.as_str(), target.as_str());
                    }
                }
                Err(e) => {
                    warn!(key, from = %from, to = %target, error = %e, "Promotion failed");
                    self.record_tier_error(target, "promote", &e);
                }
            }
        }
    }

    /// Remove `key` from every tier. Missing keys and tier failures are not
    /// errors; failures are logged and counted.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, key: &str) {
        for level in TierLevel::ALL {
            let Some(tier) = self.tier(level) else {
                continue;
            };
            match tier.delete(key).await {
                Ok(()) => {}
                Err(TierError::Unavailable(_)) => {}
                Err(e) => {
                    warn!(key, tier = %level, error = %e, "Failed to delete from tier");
                    self.record_tier_error(level, "delete", &e);
                }
            }
        }
        if self.emit_metrics() {
            crate::metrics::record_operation("all", "delete", "success");
        }
    }

    /// Remove every cache-owned entry from every tier and reset the counters.
    ///
    /// Only this cache's data goes: prefixed keys in the shared string
    /// stores and the dedicated database table.
    #[tracing::instrument(skip(self))]
    pub async fn clear(&self) {
        for level in TierLevel::ALL {
            let Some(tier) = self.tier(level) else {
                continue;
            };
            match tier.clear().await {
                Ok(()) => debug!(tier = %level, "Tier cleared"),
                Err(TierError::Unavailable(_)) => {}
                Err(e) => warn!(tier = %level, error = %e, "Failed to clear tier"),
            }
        }
        self.collector.reset();
        if self.emit_metrics() {
            crate::metrics::record_operation("all", "clear", "success");
        }
    }
}
