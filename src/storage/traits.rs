// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache_item::CacheItem;

/// Storage tier, ordered fastest to slowest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TierLevel {
    /// In-process map, no serialization
    Memory,
    /// Session-scoped string store
    Session,
    /// Durable string store
    Local,
    /// Durable structured database
    StructuredDb,
}

impl TierLevel {
    /// Lookup order for reads.
    pub const ALL: [TierLevel; 4] = [
        TierLevel::Memory,
        TierLevel::Session,
        TierLevel::Local,
        TierLevel::StructuredDb,
    ];

    /// The next tier closer to memory, if any.
    #[must_use]
    pub fn faster(self) -> Option<TierLevel> {
        match self {
            TierLevel::Memory => None,
            TierLevel::Session => Some(TierLevel::Memory),
            TierLevel::Local => Some(TierLevel::Session),
            TierLevel::StructuredDb => Some(TierLevel::Local),
        }
    }

    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TierLevel::Memory => "memory",
            TierLevel::Session => "session",
            TierLevel::Local => "local",
            TierLevel::StructuredDb => "structured-db",
        }
    }
}

impl fmt::Display for TierLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum TierError {
    #[error("{level} tier quota exceeded: need {needed} bytes, capacity {capacity}")]
    QuotaExceeded {
        level: TierLevel,
        needed: usize,
        capacity: usize,
    },
    #[error("item of {size} bytes exceeds tier capacity of {capacity} bytes")]
    TooLarge { size: usize, capacity: usize },
    #[error("unreadable entry for '{key}': {reason}")]
    Deserialization { key: String, reason: String },
    #[error("{0} tier unavailable")]
    Unavailable(TierLevel),
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl TierError {
    /// Short label for metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            TierError::QuotaExceeded { .. } => "quota",
            TierError::TooLarge { .. } => "too_large",
            TierError::Deserialization { .. } => "deserialization",
            TierError::Unavailable(_) => "unavailable",
            TierError::Backend(_) => "backend",
        }
    }
}

/// Whether a tier can take requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TierStatus {
    Ready,
    /// Backing store still opening; reads skip it, writes wait
    Opening,
    /// Failed to open, skipped for the rest of the process
    Unavailable,
    /// Turned off by configuration
    Disabled,
}

impl fmt::Display for TierStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => write!(f, "Ready"),
            Self::Opening => write!(f, "Opening"),
            Self::Unavailable => write!(f, "Unavailable"),
            Self::Disabled => write!(f, "Disabled"),
        }
    }
}

/// Outcome of a successful `put`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PutReceipt {
    /// Entries removed to make room for the write
    pub evicted: usize,
    /// Bytes freed by those removals
    pub evicted_bytes: usize,
}

/// Uniform contract over a storage tier.
///
/// Keys passed in are the caller's cache keys; adapters apply their own
/// namespacing (prefix or dedicated table) and never touch data they did
/// not write.
#[async_trait]
pub trait CacheTier: Send + Sync {
    fn level(&self) -> TierLevel;

    /// Whether the tier can serve requests right now.
    fn is_available(&self) -> bool {
        true
    }

    fn status(&self) -> TierStatus {
        if self.is_available() {
            TierStatus::Ready
        } else {
            TierStatus::Unavailable
        }
    }

    /// Wait until the tier has settled (opened or failed) and report
    /// whether it is usable.
    async fn ready(&self) -> bool {
        self.is_available()
    }

    async fn get(&self, key: &str) -> Result<Option<CacheItem>, TierError>;

    async fn put(&self, key: &str, item: &CacheItem) -> Result<PutReceipt, TierError>;

    /// Remove a key. Absent keys are not an error.
    async fn delete(&self, key: &str) -> Result<(), TierError>;

    /// Remove every entry owned by this tier.
    async fn clear(&self) -> Result<(), TierError>;

    /// Persist the access bookkeeping of an item that was just read.
    async fn record_access(&self, key: &str, item: &CacheItem) -> Result<(), TierError>;

    /// Free space after a quota failure. Returns the number of entries removed.
    async fn evict_for_quota(&self, _fraction: f64) -> Result<usize, TierError> {
        Ok(0)
    }

    /// Remove entries that are no longer valid at `now`. Returns the count.
    async fn purge_expired(&self, now: i64) -> Result<usize, TierError>;

    /// Bytes currently held by this tier's entries.
    async fn usage_bytes(&self) -> Result<usize, TierError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_is_fastest_first() {
        assert_eq!(TierLevel::ALL[0], TierLevel::Memory);
        assert_eq!(TierLevel::ALL[3], TierLevel::StructuredDb);
        assert!(TierLevel::Memory < TierLevel::StructuredDb);
        for (i, level) in TierLevel::ALL.iter().enumerate() {
            assert_eq!(level.index(), i);
        }
    }

    #[test]
    fn test_faster_chain() {
        assert_eq!(TierLevel::StructuredDb.faster(), Some(TierLevel::Local));
        assert_eq!(TierLevel::Local.faster(), Some(TierLevel::Session));
        assert_eq!(TierLevel::Session.faster(), Some(TierLevel::Memory));
        assert_eq!(TierLevel::Memory.faster(), None);
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&TierLevel::StructuredDb).unwrap(), "\"structured-db\"");
        let level: TierLevel = serde_json::from_str("\"session\"").unwrap();
        assert_eq!(level, TierLevel::Session);
        assert_eq!(TierLevel::Local.to_string(), "local");
    }

    #[test]
    fn test_error_display() {
        let err = TierError::QuotaExceeded { level: TierLevel::Local, needed: 10, capacity: 5 };
        assert_eq!(err.to_string(), "local tier quota exceeded: need 10 bytes, capacity 5");
        assert_eq!(err.kind(), "quota");
        assert_eq!(TierError::Unavailable(TierLevel::StructuredDb).to_string(), "structured-db tier unavailable");
    }
}
