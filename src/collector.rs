// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! In-process counters behind `CacheManager::get_metrics`.
//!
//! Counters are lock-free atomics; only the running average takes a lock.
//! Everything is reset by `CacheManager::clear`.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::Serialize;

use crate::storage::traits::TierLevel;

/// Point-in-time view of the cache counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheMetrics {
    pub total_requests: u64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub errors: u64,
    /// Smoothed `get` latency: each sample moves the value halfway toward it
    pub average_response_time_ms: f64,
    pub hits_by_level: BTreeMap<TierLevel, u64>,
    /// Hits served by a level divided by all requests
    pub hit_rate_by_level: BTreeMap<TierLevel, f64>,
    /// Bytes held per level, as reported by the tiers
    pub size_by_level: BTreeMap<TierLevel, usize>,
}

impl CacheMetrics {
    /// `hits / total_requests`, or 0 before the first request.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        ratio(self.hits, self.total_requests)
    }
}

fn ratio(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

pub struct MetricsCollector {
    total_requests: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    errors: AtomicU64,
    hits_by_level: [AtomicU64; 4],
    average_response_time_ms: Mutex<f64>,
    track_timing: bool,
}

impl MetricsCollector {
    #[must_use]
    pub fn new(track_timing: bool) -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            hits_by_level: Default::default(),
            average_response_time_ms: Mutex::new(0.0),
            track_timing,
        }
    }

    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_hit(&self, level: TierLevel) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        self.hits_by_level[level.index()].fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evictions(&self, count: usize) {
        if count > 0 {
            self.evictions.fetch_add(count as u64, Ordering::Relaxed);
        }
    }

    /// Fold a `get` latency sample into the running average.
    pub fn record_response_time(&self, elapsed_ms: f64) {
        if !self.track_timing {
            return;
        }
        let mut avg = self.average_response_time_ms.lock();
        *avg = (*avg + elapsed_ms) / 2.0;
    }

    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        ratio(
            self.hits.load(Ordering::Relaxed),
            self.total_requests.load(Ordering::Relaxed),
        )
    }

    /// Build a snapshot; tier byte usage is supplied by the caller.
    #[must_use]
    pub fn snapshot(&self, size_by_level: BTreeMap<TierLevel, usize>) -> CacheMetrics {
        let total_requests = self.total_requests.load(Ordering::Relaxed);

        let mut hits_by_level = BTreeMap::new();
        let mut hit_rate_by_level = BTreeMap::new();
        for level in TierLevel::ALL {
            let level_hits = self.hits_by_level[level.index()].load(Ordering::Relaxed);
            hits_by_level.insert(level, level_hits);
            hit_rate_by_level.insert(level, ratio(level_hits, total_requests));
        }

        CacheMetrics {
            total_requests,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            average_response_time_ms: *self.average_response_time_ms.lock(),
            hits_by_level,
            hit_rate_by_level,
            size_by_level,
        }
    }

    pub fn reset(&self) {
        self.total_requests.store(0, Ordering::Relaxed);
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        self.errors.store(0, Ordering::Relaxed);
        for counter in &self.hits_by_level {
            counter.store(0, Ordering::Relaxed);
        }
        *self.average_response_time_ms.lock() = 0.0;
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new(true)
    }
}
