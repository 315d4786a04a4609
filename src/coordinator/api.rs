// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Inspection API: metrics, tier health, item location, manual sweeps.

use std::collections::BTreeMap;

use tracing::debug;

use crate::cache_item::now_millis;
use crate::collector::CacheMetrics;
use crate::config::CacheConfig;
use crate::storage::traits::{TierError, TierLevel, TierStatus};

use super::{CacheManager, ItemLocation};

impl CacheManager {
    // ═══════════════════════════════════════════════════════════════════════════
    // API: Metrics & Inspection
    // ═══════════════════════════════════════════════════════════════════════════

    /// Snapshot of the counters plus current byte usage per available tier.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use tiered_cache::CacheManager;
    /// # async fn example(cache: &CacheManager) {
    /// let metrics = cache.get_metrics().await;
    /// println!(
    ///     "{} requests, {:.0}% hits, {} evictions",
    ///     metrics.total_requests,
    ///     metrics.hit_rate() * 100.0,
    ///     metrics.evictions
    /// );
    /// # }
    /// ```
    pub async fn get_metrics(&self) -> CacheMetrics {
        let mut size_by_level = BTreeMap::new();
        for level in TierLevel::ALL {
            let Some(tier) = self.tier(level) else {
                continue;
            };
            if !tier.is_available() {
                continue;
            }
            match tier.usage_bytes().await {
                Ok(bytes) => {
                    if self.emit_metrics() {
                        crate::metrics::set_tier_bytes(level.as_str(), bytes);
                    }
                    size_by_level.insert(level, bytes);
                }
                Err(e) => debug!(tier = %level, error = %e, "Could not read tier usage"),
            }
        }
        self.collector.snapshot(size_by_level)
    }

    /// `hits / total_requests`, in `[0, 1]`; 0 before the first `get`.
    #[must_use]
    pub fn get_hit_rate(&self) -> f64 {
        self.collector.hit_rate()
    }

    /// Which tiers hold a raw entry for `key`.
    ///
    /// Expired entries still count. This is not a read: it does not touch
    /// the counters, access bookkeeping or promotion.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use tiered_cache::{CacheManager, ItemLocation};
    /// # async fn example(cache: &CacheManager) {
    /// match cache.locate("user:42").await {
    ///     ItemLocation::Present { in_memory, in_structured_db, .. } => {
    ///         println!("memory={}, structured-db={}", in_memory, in_structured_db);
    ///     }
    ///     ItemLocation::Missing => println!("Not cached"),
    /// }
    /// # }
    /// ```
    pub async fn locate(&self, key: &str) -> ItemLocation {
        let mut levels = Vec::new();
        for level in TierLevel::ALL {
            let Some(tier) = self.tier(level) else {
                continue;
            };
            if !tier.is_available() {
                continue;
            }
            match tier.get(key).await {
                Ok(Some(_)) | Err(TierError::Deserialization { .. }) => levels.push(level),
                Ok(None) => {}
                Err(e) => debug!(key, tier = %level, error = %e, "Lookup failed while locating"),
            }
        }
        ItemLocation::from_levels(&levels)
    }

    /// Status of every tier, fastest first.
    #[must_use]
    pub fn tier_status(&self) -> Vec<(TierLevel, TierStatus)> {
        TierLevel::ALL
            .iter()
            .map(|&level| {
                let status = match self.tier(level) {
                    Some(tier) => tier.status(),
                    None => TierStatus::Disabled,
                };
                if self.emit_metrics() {
                    crate::metrics::set_tier_available(level.as_str(), status == TierStatus::Ready);
                }
                (level, status)
            })
            .collect()
    }

    /// Sweep expired entries now, from every available tier.
    ///
    /// Returns the number of entries removed.
    pub async fn purge_expired(&self) -> usize {
        let tiers: Vec<_> = self.tiers.iter().flatten().cloned().collect();
        let purged =
            crate::cleanup::sweep_expired(&tiers, now_millis(), true, self.emit_metrics()).await;
        if purged > 0 {
            debug!(purged, "Manual expiry sweep");
        }
        purged
    }

    /// Whether `level` was configured and can serve reads right now.
    #[must_use]
    pub fn is_available(&self, level: TierLevel) -> bool {
        self.tier(level).is_some_and(|tier| tier.is_available())
    }

    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
}
