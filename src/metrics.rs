// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for tiered-cache.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The host application is responsible for choosing the exporter (Prometheus, OTEL, etc.)
//! and nothing is recorded until it installs one. The in-process snapshot returned by
//! `CacheManager::get_metrics` lives in [`crate::collector`] and does not depend on this.
//!
//! # Metric Naming Convention
//! - `tiered_cache_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//! - `_bytes` suffix for sizes
//!
//! # Labels
//! - `tier`: memory, session, local, structured-db
//! - `operation`: get, set, delete, clear, promote, purge
//! - `status`: hit, miss, success, error

use metrics::{counter, gauge, histogram};
use std::time::{Duration, Instant};

/// Record a completed operation
pub fn record_operation(tier: &str, operation: &str, status: &str) {
    counter!(
        "tiered_cache_operations_total",
        "tier" => tier.to_string(),
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record operation latency
pub fn record_latency(tier: &str, operation: &str, duration: Duration) {
    histogram!(
        "tiered_cache_operation_seconds",
        "tier" => tier.to_string(),
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record entries removed to fit the memory ceiling or a storage quota
pub fn record_eviction(tier: &str, count: usize, bytes: usize) {
    counter!("tiered_cache_evictions_total", "tier" => tier.to_string()).increment(count as u64);
    if bytes > 0 {
        counter!("tiered_cache_evicted_bytes_total", "tier" => tier.to_string())
            .increment(bytes as u64);
    }
}

/// Record a quota recovery pass and whether the retried write went through
pub fn record_quota_recovery(tier: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "tiered_cache_quota_recoveries_total",
        "tier" => tier.to_string(),
        "status" => status
    )
    .increment(1);
}

/// Record an item copied toward memory
pub fn record_promotion(from: &str, to: &str) {
    counter!(
        "tiered_cache_promotions_total",
        "from" => from.to_string(),
        "to" => to.to_string()
    )
    .increment(1);
}

/// Record an unreadable entry found (and dropped) during a read
pub fn record_corruption(tier: &str) {
    counter!(
        "tiered_cache_corruption_detected_total",
        "tier" => tier.to_string()
    )
    .increment(1);
}

/// Record expired entries removed by a sweep or a read
pub fn record_expired(tier: &str, count: usize) {
    counter!(
        "tiered_cache_expired_total",
        "tier" => tier.to_string()
    )
    .increment(count as u64);
}

// ═══════════════════════════════════════════════════════════════════════════
// ERROR TRACKING - Categorized error counters for alerting
// ═══════════════════════════════════════════════════════════════════════════

/// Record an error with category for alerting
pub fn record_error(tier: &str, operation: &str, error_type: &str) {
    counter!(
        "tiered_cache_errors_total",
        "tier" => tier.to_string(),
        "operation" => operation.to_string(),
        "error_type" => error_type.to_string()
    )
    .increment(1);
}

// ═══════════════════════════════════════════════════════════════════════════
// GAUGES - Current state
// ═══════════════════════════════════════════════════════════════════════════

/// Set bytes currently held by a tier
pub fn set_tier_bytes(tier: &str, bytes: usize) {
    gauge!("tiered_cache_tier_bytes", "tier" => tier.to_string()).set(bytes as f64);
}

/// Set overall hit rate (0.0 - 1.0)
pub fn set_hit_rate(rate: f64) {
    gauge!("tiered_cache_hit_rate").set(rate);
}

/// Set tier availability (1 = usable, 0 = opening, failed or disabled)
pub fn set_tier_available(tier: &str, available: bool) {
    gauge!(
        "tiered_cache_tier_available",
        "tier" => tier.to_string()
    )
    .set(if available { 1.0 } else { 0.0 });
}

/// Record the outcome of opening a durable tier
pub fn record_tier_open(tier: &str, success: bool, duration: Duration) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "tiered_cache_tier_open_total",
        "tier" => tier.to_string(),
        "status" => status
    )
    .increment(1);
    histogram!("tiered_cache_tier_open_seconds", "tier" => tier.to_string())
        .record(duration.as_secs_f64());
}

/// Record a cleanup sweep
pub fn record_cleanup_run(purged: usize, duration: Duration) {
    counter!("tiered_cache_cleanup_runs_total").increment(1);
    histogram!("tiered_cache_cleanup_seconds").record(duration.as_secs_f64());
    histogram!("tiered_cache_cleanup_purged").record(purged as f64);
}

/// A timing guard that records latency on drop
pub struct LatencyTimer {
    tier: &'static str,
    operation: &'static str,
    start: Instant,
}

impl LatencyTimer {
    /// Start a new latency timer
    pub fn new(tier: &'static str, operation: &'static str) -> Self {
        Self {
            tier,
            operation,
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        record_latency(self.tier, self.operation, self.start.elapsed());
    }
}
