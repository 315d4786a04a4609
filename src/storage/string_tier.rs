// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Cache tier over a shared string key/value area.
//!
//! Keys are stored as `{prefix}{key}` and values as [`ItemCodec`] blobs.
//! Only prefixed keys are ever listed, cleared, purged or evicted.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::cache_item::CacheItem;
use crate::codec::ItemCodec;
use crate::eviction::quota;
use super::kv::{KvBackend, KvError};
use super::traits::{CacheTier, PutReceipt, TierError, TierLevel};

pub struct StringTier {
    level: TierLevel,
    backend: Arc<dyn KvBackend>,
    prefix: String,
    codec: ItemCodec,
}

impl StringTier {
    pub fn new(
        level: TierLevel,
        backend: Arc<dyn KvBackend>,
        prefix: impl Into<String>,
        codec: ItemCodec,
    ) -> Self {
        Self {
            level,
            backend,
            prefix: prefix.into(),
            codec,
        }
    }

    fn storage_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    fn map_err(&self, err: KvError) -> TierError {
        match err {
            KvError::QuotaExceeded { needed, capacity } => TierError::QuotaExceeded {
                level: self.level,
                needed,
                capacity,
            },
            other => TierError::Backend(other.to_string()),
        }
    }

    /// Prefixed keys in insertion order.
    async fn owned_keys(&self) -> Result<Vec<String>, TierError> {
        let keys = self.backend.keys().await.map_err(|e| self.map_err(e))?;
        Ok(keys
            .into_iter()
            .filter(|k| k.starts_with(&self.prefix))
            .collect())
    }

    async fn remove_raw(&self, storage_key: &str) -> Result<(), TierError> {
        self.backend
            .remove(storage_key)
            .await
            .map_err(|e| self.map_err(e))
    }
}

#[async_trait]
impl CacheTier for StringTier {
    fn level(&self) -> TierLevel {
        self.level
    }

    async fn get(&self, key: &str) -> Result<Option<CacheItem>, TierError> {
        let blob = self
            .backend
            .get(&self.storage_key(key))
            .await
            .map_err(|e| self.map_err(e))?;

        match blob {
            None => Ok(None),
            Some(blob) => self
                .codec
                .deserialize(&blob)
                .map(Some)
                .map_err(|e| TierError::Deserialization {
                    key: key.to_string(),
                    reason: e.to_string(),
                }),
        }
    }

    async fn put(&self, key: &str, item: &CacheItem) -> Result<PutReceipt, TierError> {
        let blob = self
            .codec
            .serialize(item)
            .map_err(|e| TierError::Backend(e.to_string()))?;
        self.backend
            .set(&self.storage_key(key), blob)
            .await
            .map_err(|e| self.map_err(e))?;
        Ok(PutReceipt::default())
    }

    async fn delete(&self, key: &str) -> Result<(), TierError> {
        self.remove_raw(&self.storage_key(key)).await
    }

    async fn clear(&self) -> Result<(), TierError> {
        let keys = self.owned_keys().await?;
        for key in &keys {
            self.remove_raw(key).await?;
        }
        debug!(level = %self.level, removed = keys.len(), "Cleared string tier");
        Ok(())
    }

    async fn record_access(&self, key: &str, item: &CacheItem) -> Result<(), TierError> {
        // Whole-value rewrite; the area has no partial update
        match self.put(key, item).await {
            Ok(_) => Ok(()),
            Err(TierError::QuotaExceeded { needed, capacity, .. }) => {
                debug!(
                    level = %self.level,
                    key,
                    needed,
                    capacity,
                    "No room to record access, keeping previous stats"
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn evict_for_quota(&self, fraction: f64) -> Result<usize, TierError> {
        let keys = self.owned_keys().await?;
        let victims = quota::select_victims(&keys, fraction);
        for key in &victims {
            self.remove_raw(key).await?;
        }
        warn!(
            level = %self.level,
            owned = keys.len(),
            evicted = victims.len(),
            "Quota exceeded, dropped oldest cache entries"
        );
        Ok(victims.len())
    }

    async fn purge_expired(&self, now: i64) -> Result<usize, TierError> {
        let mut purged = 0;
        for storage_key in self.owned_keys().await? {
            let Some(blob) = self.backend.get(&storage_key).await.map_err(|e| self.map_err(e))? else {
                continue;
            };
            let stale = match self.codec.deserialize(&blob) {
                Ok(item) => !item.is_valid_at(now),
                // Unreadable entries can never be served
                Err(_) => true,
            };
            // A concurrent write may have replaced the blob since it was read
            if stale
                && self
                    .backend
                    .remove_if(&storage_key, &blob)
                    .await
                    .map_err(|e| self.map_err(e))?
            {
                purged += 1;
            }
        }
        Ok(purged)
    }

    async fn usage_bytes(&self) -> Result<usize, TierError> {
        let mut total = 0;
        for storage_key in self.owned_keys().await? {
            if let Some(blob) = self.backend.get(&storage_key).await.map_err(|e| self.map_err(e))? {
                total += storage_key.len() + blob.len();
            }
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::kv::SessionStore;
    use serde_json::json;

    /// Session store where a writer replaces one entry right after it is read.
    struct RacingStore {
        inner: SessionStore,
        replacement: parking_lot::Mutex<Option<(String, String)>>,
    }

    #[async_trait]
    impl KvBackend for RacingStore {
        async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
            let value = self.inner.get(key).await?;
            let pending = self.replacement.lock().take();
            if let Some((target, fresh)) = pending {
                self.inner.set(&target, fresh).await?;
            }
            Ok(value)
        }

        async fn set(&self, key: &str, value: String) -> Result<(), KvError> {
            self.inner.set(key, value).await
        }

        async fn remove(&self, key: &str) -> Result<(), KvError> {
            self.inner.remove(key).await
        }

        async fn remove_if(&self, key: &str, expected: &str) -> Result<bool, KvError> {
            self.inner.remove_if(key, expected).await
        }

        async fn keys(&self) -> Result<Vec<String>, KvError> {
            self.inner.keys().await
        }

        async fn used_bytes(&self) -> Result<usize, KvError> {
            self.inner.used_bytes().await
        }

        fn capacity_bytes(&self) -> usize {
            self.inner.capacity_bytes()
        }
    }

    fn tier_with(store: Arc<SessionStore>) -> StringTier {
        StringTier::new(TierLevel::Session, store, "cache_", ItemCodec::new(true))
    }

    #[tokio::test]
    async fn test_put_get_uses_prefix() {
        let store = Arc::new(SessionStore::new(64 * 1024));
        let tier = tier_with(store.clone());
        let item = CacheItem::new(json!({"v": 1}), 60_000, 0);

        tier.put("user", &item).await.unwrap();

        assert_eq!(tier.get("user").await.unwrap(), Some(item));
        assert_eq!(store.keys().await.unwrap(), vec!["cache_user"]);
    }

    #[tokio::test]
    async fn test_foreign_keys_untouched() {
        let store = Arc::new(SessionStore::new(64 * 1024));
        store.set("theme", "dark".into()).await.unwrap();
        let tier = tier_with(store.clone());

        tier.put("a", &CacheItem::new(json!(1), 60_000, 0)).await.unwrap();
        tier.clear().await.unwrap();

        assert_eq!(store.keys().await.unwrap(), vec!["theme"]);
        assert_eq!(tier.usage_bytes().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_deserialization_error() {
        let store = Arc::new(SessionStore::new(64 * 1024));
        store.set("cache_bad", "!!not-an-item!!".into()).await.unwrap();
        let tier = tier_with(store);

        let err = tier.get("bad").await.unwrap_err();
        assert!(matches!(err, TierError::Deserialization { ref key, .. } if key == "bad"));
    }

    #[tokio::test]
    async fn test_quota_maps_to_tier_error() {
        let store = Arc::new(SessionStore::new(32));
        let tier = tier_with(store);

        let big = CacheItem::new(json!("x".repeat(200)), 60_000, 0);
        let err = tier.put("big", &big).await.unwrap_err();

        assert!(matches!(
            err,
            TierError::QuotaExceeded { level: TierLevel::Session, capacity: 32, .. }
        ));
    }

    #[tokio::test]
    async fn test_evict_for_quota_drops_oldest_owned() {
        let store = Arc::new(SessionStore::new(64 * 1024));
        store.set("foreign", "keep".into()).await.unwrap();
        let tier = tier_with(store.clone());
        for i in 0..10 {
            tier.put(&format!("k{}", i), &CacheItem::new(json!(i), 60_000, 0)).await.unwrap();
        }

        let evicted = tier.evict_for_quota(0.3).await.unwrap();

        assert_eq!(evicted, 3);
        for i in 0..3 {
            assert!(tier.get(&format!("k{}", i)).await.unwrap().is_none());
        }
        assert!(tier.get("k3").await.unwrap().is_some());
        assert_eq!(store.get("foreign").await.unwrap(), Some("keep".to_string()));
    }

    #[tokio::test]
    async fn test_purge_expired_and_corrupt() {
        let store = Arc::new(SessionStore::new(64 * 1024));
        let tier = tier_with(store.clone());
        tier.put("old", &CacheItem::new(json!(1), 10, 0)).await.unwrap();
        tier.put("fresh", &CacheItem::new(json!(2), 60_000, 0)).await.unwrap();
        store.set("cache_junk", "???".into()).await.unwrap();

        let purged = tier.purge_expired(1_000).await.unwrap();

        assert_eq!(purged, 2);
        assert!(tier.get("fresh").await.unwrap().is_some());
        assert_eq!(store.keys().await.unwrap(), vec!["cache_fresh"]);
    }

    #[tokio::test]
    async fn test_record_access_persists_count() {
        let store = Arc::new(SessionStore::new(64 * 1024));
        let tier = tier_with(store);
        let mut item = CacheItem::new(json!("v"), 60_000, 0);
        tier.put("k", &item).await.unwrap();

        item.touch(50);
        tier.record_access("k", &item).await.unwrap();

        let stored = tier.get("k").await.unwrap().unwrap();
        assert_eq!(stored.access_count, 1);
        assert_eq!(stored.last_accessed, 50);
    }

    #[tokio::test]
    async fn test_record_access_without_room_keeps_entry() {
        let item = CacheItem::new(json!("v"), 60_000, 0);
        let blob = ItemCodec::new(true).serialize(&item).unwrap();
        // Exactly enough room for the untouched entry
        let store = Arc::new(SessionStore::new("cache_k".len() + blob.len()));
        let tier = tier_with(store);
        tier.put("k", &item).await.unwrap();

        let mut touched = item.clone();
        touched.touch(1_700_000_000_000);
        tier.record_access("k", &touched).await.unwrap();

        let stored = tier.get("k").await.unwrap().unwrap();
        assert_eq!(stored, item);
    }

    #[tokio::test]
    async fn test_purge_spares_entry_rewritten_mid_sweep() {
        let codec = ItemCodec::new(true);
        let fresh = CacheItem::new(json!("fresh"), 60_000, 900);
        let store = Arc::new(RacingStore {
            inner: SessionStore::new(64 * 1024),
            replacement: parking_lot::Mutex::new(Some((
                "cache_k".to_string(),
                codec.serialize(&fresh).unwrap(),
            ))),
        });
        let tier = StringTier::new(TierLevel::Session, store, "cache_", codec);
        tier.put("k", &CacheItem::new(json!("old"), 10, 0)).await.unwrap();

        // The sweep reads the expired blob, then the writer lands
        let purged = tier.purge_expired(1_000).await.unwrap();

        assert_eq!(purged, 0);
        assert_eq!(tier.get("k").await.unwrap(), Some(fresh));
    }
}
