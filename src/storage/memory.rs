use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::cache_item::CacheItem;
use crate::eviction::lru::{self, LruCandidate};
use super::traits::{CacheTier, PutReceipt, TierError, TierLevel};

/// In-process tier. Items are stored as-is, no serialization.
///
/// Byte usage is the sum of `CacheItem::size` over live entries and never
/// exceeds `max_bytes`: writes that would cross it evict least-recently-used
/// entries first.
pub struct MemoryTier {
    data: DashMap<String, CacheItem>,
    used_bytes: AtomicUsize,
    max_bytes: usize,
    /// Serializes writers so eviction and size accounting stay consistent
    write_lock: Mutex<()>,
}

impl MemoryTier {
    #[must_use]
    pub fn new(max_bytes: usize) -> Self {
        Self {
            data: DashMap::new(),
            used_bytes: AtomicUsize::new(0),
            max_bytes,
            write_lock: Mutex::new(()),
        }
    }

    /// Get current item count
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn used_bytes(&self) -> usize {
        self.used_bytes.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    fn remove_entry(&self, key: &str) -> Option<CacheItem> {
        let (_, item) = self.data.remove(key)?;
        self.used_bytes.fetch_sub(item.size.min(self.used_bytes()), Ordering::Release);
        Some(item)
    }
}

#[async_trait]
impl CacheTier for MemoryTier {
    fn level(&self) -> TierLevel {
        TierLevel::Memory
    }

    async fn get(&self, key: &str) -> Result<Option<CacheItem>, TierError> {
        Ok(self.data.get(key).map(|r| r.value().clone()))
    }

    async fn put(&self, key: &str, item: &CacheItem) -> Result<PutReceipt, TierError> {
        if item.size > self.max_bytes {
            return Err(TierError::TooLarge {
                size: item.size,
                capacity: self.max_bytes,
            });
        }

        let _guard = self.write_lock.lock();
        let mut receipt = PutReceipt::default();

        let replaced = self.data.get(key).map(|r| r.size).unwrap_or(0);
        let projected = self.used_bytes().saturating_sub(replaced) + item.size;

        if projected > self.max_bytes {
            let candidates: Vec<LruCandidate> = self
                .data
                .iter()
                .filter(|r| r.key() != key)
                .map(|r| LruCandidate {
                    key: r.key().clone(),
                    size: r.value().size,
                    last_accessed: r.value().last_accessed,
                })
                .collect();

            for victim in lru::select_victims(candidates, projected - self.max_bytes) {
                if let Some(evicted) = self.remove_entry(&victim.key) {
                    receipt.evicted += 1;
                    receipt.evicted_bytes += evicted.size;
                }
            }
            debug!(
                evicted = receipt.evicted,
                evicted_bytes = receipt.evicted_bytes,
                "LRU eviction in memory tier"
            );
        }

        if let Some(old) = self.data.insert(key.to_string(), item.clone()) {
            let current = self.used_bytes();
            self.used_bytes
                .store(current.saturating_sub(old.size) + item.size, Ordering::Release);
        } else {
            self.used_bytes.fetch_add(item.size, Ordering::Release);
        }

        Ok(receipt)
    }

    async fn delete(&self, key: &str) -> Result<(), TierError> {
        let _guard = self.write_lock.lock();
        self.remove_entry(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), TierError> {
        let _guard = self.write_lock.lock();
        self.data.clear();
        self.used_bytes.store(0, Ordering::Release);
        Ok(())
    }

    async fn record_access(&self, key: &str, item: &CacheItem) -> Result<(), TierError> {
        if let Some(mut entry) = self.data.get_mut(key) {
            entry.access_count = item.access_count;
            entry.last_accessed = item.last_accessed;
        }
        Ok(())
    }

    async fn purge_expired(&self, now: i64) -> Result<usize, TierError> {
        let _guard = self.write_lock.lock();
        let expired: Vec<String> = self
            .data
            .iter()
            .filter(|r| !r.value().is_valid_at(now))
            .map(|r| r.key().clone())
            .collect();

        let mut purged = 0;
        for key in &expired {
            if self.remove_entry(key).is_some() {
                purged += 1;
            }
        }
        Ok(purged)
    }

    async fn usage_bytes(&self) -> Result<usize, TierError> {
        Ok(self.used_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item_of(bytes: usize, now: i64) -> CacheItem {
        // JSON string of n chars serializes to n + 2 bytes
        CacheItem::new(json!("x".repeat(bytes - 2)), 60_000, now)
    }

    #[tokio::test]
    async fn test_new_tier_is_empty() {
        let tier = MemoryTier::new(1024);
        assert!(tier.is_empty());
        assert_eq!(tier.len(), 0);
        assert_eq!(tier.used_bytes(), 0);
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let tier = MemoryTier::new(1024);
        let item = CacheItem::new(json!({"test": "data"}), 1_000, 0);

        tier.put("item-1", &item).await.unwrap();

        let result = tier.get("item-1").await.unwrap();
        assert_eq!(result, Some(item.clone()));
        assert_eq!(tier.used_bytes(), item.size);
    }

    #[tokio::test]
    async fn test_get_nonexistent_returns_none() {
        let tier = MemoryTier::new(1024);
        assert!(tier.get("nonexistent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete() {
        let tier = MemoryTier::new(1024);
        tier.put("to-delete", &item_of(100, 0)).await.unwrap();

        tier.delete("to-delete").await.unwrap();

        assert!(tier.is_empty());
        assert_eq!(tier.used_bytes(), 0);
        // Deleting again is fine
        assert!(tier.delete("to-delete").await.is_ok());
    }

    #[tokio::test]
    async fn test_put_overwrites_and_tracks_size() {
        let tier = MemoryTier::new(1024);

        tier.put("same", &item_of(100, 0)).await.unwrap();
        tier.put("same", &item_of(300, 0)).await.unwrap();

        assert_eq!(tier.len(), 1);
        assert_eq!(tier.used_bytes(), 300);
    }

    #[tokio::test]
    async fn test_lru_eviction_keeps_ceiling() {
        let tier = MemoryTier::new(1_000);

        for i in 0..4 {
            tier.put(&format!("k{}", i), &item_of(250, i)).await.unwrap();
        }
        assert_eq!(tier.used_bytes(), 1_000);

        let receipt = tier.put("k4", &item_of(250, 10)).await.unwrap();

        assert_eq!(receipt.evicted, 1);
        assert_eq!(receipt.evicted_bytes, 250);
        assert!(!tier.contains("k0"), "oldest entry should be evicted");
        assert!(tier.contains("k4"));
        assert!(tier.used_bytes() <= 1_000);
    }

    #[tokio::test]
    async fn test_recently_read_entry_survives() {
        let tier = MemoryTier::new(500);
        tier.put("a", &item_of(250, 1)).await.unwrap();
        tier.put("b", &item_of(250, 2)).await.unwrap();

        // Reading "a" makes "b" the least recently used
        let mut a = tier.get("a").await.unwrap().unwrap();
        a.touch(100);
        tier.record_access("a", &a).await.unwrap();

        tier.put("c", &item_of(250, 3)).await.unwrap();

        assert!(tier.contains("a"));
        assert!(!tier.contains("b"));
    }

    #[tokio::test]
    async fn test_oversized_item_rejected() {
        let tier = MemoryTier::new(100);
        let result = tier.put("big", &item_of(200, 0)).await;

        assert!(matches!(result, Err(TierError::TooLarge { size: 200, capacity: 100 })));
        assert!(tier.is_empty());
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let tier = MemoryTier::new(10_000);
        tier.put("short", &CacheItem::new(json!(1), 10, 0)).await.unwrap();
        tier.put("long", &CacheItem::new(json!(2), 10_000, 0)).await.unwrap();

        let purged = tier.purge_expired(100).await.unwrap();

        assert_eq!(purged, 1);
        assert!(!tier.contains("short"));
        assert!(tier.contains("long"));
        assert_eq!(tier.used_bytes(), 1);
    }

    #[tokio::test]
    async fn test_clear() {
        let tier = MemoryTier::new(10_000);
        for i in 0..10 {
            tier.put(&format!("item-{}", i), &item_of(50, i)).await.unwrap();
        }

        tier.clear().await.unwrap();

        assert!(tier.is_empty());
        assert_eq!(tier.usage_bytes().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_access_respects_ceiling() {
        use std::sync::Arc;

        let tier = Arc::new(MemoryTier::new(5_000));
        let mut handles = vec![];

        for batch in 0..10 {
            let tier = tier.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..10 {
                    tier.put(&format!("batch-{}-item-{}", batch, i), &item_of(100, i)).await.unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(tier.used_bytes() <= 5_000);
        assert_eq!(tier.len(), 50);
    }
}
