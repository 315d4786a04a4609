// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Cache item envelope.
//!
//! The [`CacheItem`] is the value stored in every tier: the payload plus the
//! bookkeeping needed for expiry, LRU eviction and promotion.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Payload plus metadata, as stored in every tier.
///
/// Field names serialize in camelCase so the persisted form reads
/// `{"data":…,"timestamp":…,"ttl":…,"accessCount":…,"lastAccessed":…,"size":…}`.
///
/// # Example
///
/// ```
/// use tiered_cache::CacheItem;
/// use serde_json::json;
///
/// let item = CacheItem::new(json!({"x": 1}), 1_000, 1_000_000);
///
/// assert!(item.is_valid_at(1_000_999));
/// assert!(!item.is_valid_at(1_001_000));
/// assert_eq!(item.access_count, 0);
/// assert_eq!(item.size, 7); // {"x":1}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheItem<T = Value> {
    /// The cached payload
    pub data: T,
    /// Write time (epoch millis)
    pub timestamp: i64,
    /// Time-to-live in milliseconds (always > 0)
    pub ttl: u64,
    /// Number of successful reads
    pub access_count: u64,
    /// Last successful read, or the write time (epoch millis)
    pub last_accessed: i64,
    /// Byte length of the serialized payload at write time
    pub size: usize,
}

impl<T: Serialize> CacheItem<T> {
    /// Build a fresh item written at `now` (epoch millis).
    pub fn new(data: T, ttl_ms: u64, now: i64) -> Self {
        let size = estimate_size(&data);
        Self {
            data,
            timestamp: now,
            ttl: ttl_ms,
            access_count: 0,
            last_accessed: now,
            size,
        }
    }
}

impl<T> CacheItem<T> {
    /// An item is valid while `now - timestamp < ttl`.
    #[must_use]
    pub fn is_valid_at(&self, now: i64) -> bool {
        let age = now.saturating_sub(self.timestamp);
        age < 0 || (age as u64) < self.ttl
    }

    /// Validity against the wall clock.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(now_millis())
    }

    /// Epoch millis at which the item stops being valid.
    #[must_use]
    pub fn expires_at(&self) -> i64 {
        self.timestamp.saturating_add(self.ttl.min(i64::MAX as u64) as i64)
    }

    /// Record a successful read.
    pub fn touch(&mut self, now: i64) {
        self.access_count = self.access_count.saturating_add(1);
        self.last_accessed = now;
    }
}

/// Current wall clock time in epoch millis.
#[must_use]
pub fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Best-effort byte length of the serialized payload.
///
/// Falls back to twice the in-memory size when the value cannot be
/// serialized, so a write is never refused over size accounting.
pub fn estimate_size<T: Serialize + ?Sized>(data: &T) -> usize {
    match serde_json::to_vec(data) {
        Ok(bytes) => bytes.len(),
        Err(_) => std::mem::size_of_val(data).saturating_mul(2),
    }
}
