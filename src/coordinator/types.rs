// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Public types for the cache manager.

use thiserror::Error;

use crate::storage::traits::{TierError, TierLevel};

/// Errors surfaced by cache writes and construction.
///
/// Reads never return errors: tier faults on the read path are logged,
/// counted and turned into misses.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("failed to serialize value: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("ttl must be greater than zero")]
    InvalidTtl,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{0} tier unavailable")]
    TierUnavailable(TierLevel),

    #[error("{level} tier error: {source}")]
    Tier {
        level: TierLevel,
        #[source]
        source: TierError,
    },
}

impl CacheError {
    pub(super) fn tier(level: TierLevel, source: TierError) -> Self {
        match source {
            TierError::Unavailable(level) => CacheError::TierUnavailable(level),
            source => CacheError::Tier { level, source },
        }
    }

    /// Short label for metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            CacheError::Serialization(_) => "serialization",
            CacheError::InvalidTtl => "invalid_ttl",
            CacheError::InvalidConfig(_) => "invalid_config",
            CacheError::TierUnavailable(_) => "unavailable",
            CacheError::Tier { source, .. } => source.kind(),
        }
    }
}

/// Where the raw entry for a key exists, ignoring expiry.
///
/// Used by [`super::CacheManager::locate()`] for diagnostics; it does not
/// count as a request and does not touch access bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemLocation {
    Present {
        in_memory: bool,
        in_session: bool,
        in_local: bool,
        in_structured_db: bool,
    },
    Missing,
}

impl ItemLocation {
    pub(super) fn from_levels(levels: &[TierLevel]) -> Self {
        if levels.is_empty() {
            return ItemLocation::Missing;
        }
        ItemLocation::Present {
            in_memory: levels.contains(&TierLevel::Memory),
            in_session: levels.contains(&TierLevel::Session),
            in_local: levels.contains(&TierLevel::Local),
            in_structured_db: levels.contains(&TierLevel::StructuredDb),
        }
    }

    #[must_use]
    pub fn is_in(&self, level: TierLevel) -> bool {
        match self {
            ItemLocation::Missing => false,
            ItemLocation::Present { in_memory, in_session, in_local, in_structured_db } => match level {
                TierLevel::Memory => *in_memory,
                TierLevel::Session => *in_session,
                TierLevel::Local => *in_local,
                TierLevel::StructuredDb => *in_structured_db,
            },
        }
    }
}

impl std::fmt::Display for ItemLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Present { in_memory, in_session, in_local, in_structured_db } => write!(
                f,
                "Present(memory={}, session={}, local={}, structured-db={})",
                in_memory, in_session, in_local, in_structured_db
            ),
            Self::Missing => write!(f, "Missing"),
        }
    }
}
