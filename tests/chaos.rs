//! Chaos Testing for Tiered Cache
//!
//! Failure scenarios driven by **FailingTier wrappers**: precise error
//! injection per operation, swapped in for a real tier through the builder.
//!
//! Reads must fail open (a broken tier is skipped and the lookup continues),
//! writes must fail closed (the error reaches the caller), and neither may
//! leave the manager in a state where the healthy tiers misbehave.
//!
//! # Running Chaos Tests
//! ```bash
//! cargo test --test chaos -- --nocapture
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tempfile::TempDir;

use tiered_cache::storage::memory::MemoryTier;
use tiered_cache::storage::traits::PutReceipt;
use tiered_cache::{
    CacheConfig, CacheError, CacheItem, CacheManager, CacheTier, SetOptions, TierError, TierLevel,
};

// =============================================================================
// Failing Tier Wrapper - Precise Error Injection
// =============================================================================

/// A memory-backed tier posing as `level` that fails selected operations.
pub struct FailingTier {
    level: TierLevel,
    inner: MemoryTier,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    fail_deletes: AtomicBool,
    /// Report every put as a quota failure
    always_full: AtomicBool,
    calls: AtomicU64,
    quota_passes: AtomicU64,
}

#[allow(dead_code)]
impl FailingTier {
    pub fn new(level: TierLevel) -> Self {
        Self {
            level,
            inner: MemoryTier::new(1024 * 1024),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
            always_full: AtomicBool::new(false),
            calls: AtomicU64::new(0),
            quota_passes: AtomicU64::new(0),
        }
    }

    pub fn failing_reads(self) -> Self {
        self.fail_reads.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_writes(self) -> Self {
        self.fail_writes.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_deletes(self) -> Self {
        self.fail_deletes.store(true, Ordering::SeqCst);
        self
    }

    pub fn always_full(self) -> Self {
        self.always_full.store(true, Ordering::SeqCst);
        self
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn quota_passes(&self) -> u64 {
        self.quota_passes.load(Ordering::SeqCst)
    }

    fn maybe_fail(&self, flag: &AtomicBool) -> Result<(), TierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if flag.load(Ordering::SeqCst) {
            Err(TierError::Backend(format!("injected {} failure", self.level)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CacheTier for FailingTier {
    fn level(&self) -> TierLevel {
        self.level
    }

    async fn get(&self, key: &str) -> Result<Option<CacheItem>, TierError> {
        self.maybe_fail(&self.fail_reads)?;
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, item: &CacheItem) -> Result<PutReceipt, TierError> {
        self.maybe_fail(&self.fail_writes)?;
        if self.always_full.load(Ordering::SeqCst) {
            return Err(TierError::QuotaExceeded {
                level: self.level,
                needed: item.size,
                capacity: 0,
            });
        }
        self.inner.put(key, item).await
    }

    async fn delete(&self, key: &str) -> Result<(), TierError> {
        self.maybe_fail(&self.fail_deletes)?;
        self.inner.delete(key).await
    }

    async fn clear(&self) -> Result<(), TierError> {
        self.maybe_fail(&self.fail_deletes)?;
        self.inner.clear().await
    }

    async fn record_access(&self, key: &str, item: &CacheItem) -> Result<(), TierError> {
        self.maybe_fail(&self.fail_writes)?;
        self.inner.record_access(key, item).await
    }

    async fn evict_for_quota(&self, _fraction: f64) -> Result<usize, TierError> {
        self.quota_passes.fetch_add(1, Ordering::SeqCst);
        Ok(1)
    }

    async fn purge_expired(&self, now: i64) -> Result<usize, TierError> {
        self.maybe_fail(&self.fail_deletes)?;
        self.inner.purge_expired(now).await
    }

    async fn usage_bytes(&self) -> Result<usize, TierError> {
        self.maybe_fail(&self.fail_reads)?;
        self.inner.usage_bytes().await
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn chaos_config(dir: &TempDir) -> CacheConfig {
    CacheConfig {
        local_path: Some(dir.path().join("local.json")),
        disabled_tiers: vec![TierLevel::StructuredDb],
        cleanup_interval_secs: 0,
        ..Default::default()
    }
}

async fn cache_with(dir: &TempDir, tier: Arc<FailingTier>) -> CacheManager {
    let level = tier.level();
    CacheManager::builder(chaos_config(dir))
        .tier(level, tier)
        .build()
        .await
        .expect("cache builds")
}

// =============================================================================
// Reads Fail Open
// =============================================================================

#[tokio::test]
async fn chaos_read_failure_falls_through_to_slower_tier() {
    let dir = TempDir::new().unwrap();
    let session = Arc::new(FailingTier::new(TierLevel::Session).failing_reads());
    let cache = cache_with(&dir, session.clone()).await;

    cache
        .set_with("k", &json!({"v": 1}), SetOptions::at(TierLevel::Local))
        .await
        .unwrap();

    // The broken session tier is skipped, local serves the read
    assert_eq!(cache.get::<Value>("k").await, Some(json!({"v": 1})));
    assert!(session.calls() > 0);

    let metrics = cache.get_metrics().await;
    assert_eq!(metrics.hits, 1);
    assert_eq!(metrics.hits_by_level[&TierLevel::Local], 1);
    assert_eq!(metrics.errors, 1);
}

#[tokio::test]
async fn chaos_read_failure_everywhere_is_a_miss() {
    let dir = TempDir::new().unwrap();
    let memory = Arc::new(FailingTier::new(TierLevel::Memory).failing_reads());
    let cache = cache_with(&dir, memory).await;

    assert_eq!(cache.get::<Value>("nothing").await, None);
    let metrics = cache.get_metrics().await;
    assert_eq!(metrics.misses, 1);
    assert_eq!(metrics.errors, 1);
}

#[tokio::test]
async fn chaos_promotion_failure_still_serves_read() {
    let dir = TempDir::new().unwrap();
    let memory = Arc::new(FailingTier::new(TierLevel::Memory).failing_writes());
    let cache = cache_with(&dir, memory).await;

    cache
        .set_with("hot", &42, SetOptions::at(TierLevel::Session))
        .await
        .unwrap();

    for _ in 0..8 {
        assert_eq!(cache.get::<i32>("hot").await, Some(42));
    }
    // Promotion into memory kept failing; the session copy carried the reads
    assert_eq!(cache.get_metrics().await.hits_by_level[&TierLevel::Session], 8);
    assert!(!cache.locate("hot").await.is_in(TierLevel::Memory));
}

// =============================================================================
// Writes Fail Closed
// =============================================================================

#[tokio::test]
async fn chaos_write_failure_surfaces_to_caller() {
    let dir = TempDir::new().unwrap();
    let session = Arc::new(FailingTier::new(TierLevel::Session).failing_writes());
    let cache = cache_with(&dir, session).await;

    let err = cache
        .set_with("k", &1, SetOptions::at(TierLevel::Session))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CacheError::Tier { level: TierLevel::Session, source: TierError::Backend(_) }
    ));
    assert_eq!(cache.get_metrics().await.errors, 1);
    assert_eq!(cache.get::<i32>("k").await, None);
}

#[tokio::test]
async fn chaos_quota_retry_happens_exactly_once() {
    let dir = TempDir::new().unwrap();
    let local = Arc::new(FailingTier::new(TierLevel::Local).always_full());
    let cache = cache_with(&dir, local.clone()).await;

    let err = cache
        .set_with("big", &"x".repeat(100), SetOptions::at(TierLevel::Local))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "quota");
    assert_eq!(local.quota_passes(), 1);
    let metrics = cache.get_metrics().await;
    assert_eq!(metrics.evictions, 1);
    assert_eq!(metrics.errors, 1);
}

#[tokio::test]
async fn chaos_invalidation_failure_does_not_fail_write() {
    let dir = TempDir::new().unwrap();
    let memory = Arc::new(FailingTier::new(TierLevel::Memory).failing_deletes());
    let cache = cache_with(&dir, memory).await;

    cache
        .set_with("k", &"durable", SetOptions::at(TierLevel::Local))
        .await
        .unwrap();

    // Counted, not surfaced
    assert_eq!(cache.get_metrics().await.errors, 1);
    assert_eq!(cache.get::<String>("k").await.as_deref(), Some("durable"));
}

// =============================================================================
// Maintenance Survives Broken Tiers
// =============================================================================

#[tokio::test]
async fn chaos_delete_and_clear_continue_past_failures() {
    let dir = TempDir::new().unwrap();
    let session = Arc::new(FailingTier::new(TierLevel::Session).failing_deletes());
    let cache = cache_with(&dir, session).await;

    cache.set("a", &1).await.unwrap();
    cache.set_with("b", &2, SetOptions::at(TierLevel::Local)).await.unwrap();

    cache.delete("a").await;
    assert_eq!(cache.get::<i32>("a").await, None);

    cache.clear().await;
    assert_eq!(cache.get::<i32>("b").await, None);
}

#[tokio::test]
async fn chaos_sweep_skips_failing_tier() {
    let dir = TempDir::new().unwrap();
    let session = Arc::new(FailingTier::new(TierLevel::Session).failing_deletes());
    let cache = cache_with(&dir, session).await;

    let short = SetOptions::default().with_ttl(Duration::from_millis(20));
    cache.set_with("m", &1, short).await.unwrap();
    cache
        .set_with("l", &2, short.with_level(TierLevel::Local))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    // Memory and local still swept while session errors
    assert_eq!(cache.purge_expired().await, 2);
}
