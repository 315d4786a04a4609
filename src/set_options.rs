// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Per-write options: lifetime and target tier.
//!
//! The caller decides where an item lives. Reads still search every tier,
//! fastest first, and hot items climb toward memory on their own.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use tiered_cache::{SetOptions, TierLevel};
//!
//! // Default: memory tier, configured default TTL
//! let opts = SetOptions::default();
//! assert_eq!(opts.level, TierLevel::Memory);
//! assert!(opts.ttl.is_none());
//!
//! // Durable, one day
//! let opts = SetOptions::durable().with_ttl(Duration::from_secs(86_400));
//! assert_eq!(opts.level, TierLevel::StructuredDb);
//! ```

use std::time::Duration;

use crate::storage::traits::TierLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetOptions {
    /// Lifetime of the item. `None` uses the configured default.
    ///
    /// Sub-millisecond durations round down, so they are rejected as zero.
    pub ttl: Option<Duration>,

    /// Tier that receives the write.
    ///
    /// Default: [`TierLevel::Memory`]
    pub level: TierLevel,
}

impl Default for SetOptions {
    fn default() -> Self {
        Self {
            ttl: None,
            level: TierLevel::Memory,
        }
    }
}

impl SetOptions {
    /// Write to `level` with the default TTL.
    #[must_use]
    pub fn at(level: TierLevel) -> Self {
        Self { ttl: None, level }
    }

    /// Write to the structured database, the longest-lived tier.
    #[must_use]
    pub fn durable() -> Self {
        Self::at(TierLevel::StructuredDb)
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    #[must_use]
    pub fn with_level(mut self, level: TierLevel) -> Self {
        self.level = level;
        self
    }

    /// Effective TTL in milliseconds.
    #[must_use]
    pub fn ttl_ms(&self, default_ttl_ms: u64) -> u64 {
        match self.ttl {
            Some(ttl) => ttl.as_millis().min(u64::MAX as u128) as u64,
            None => default_ttl_ms,
        }
    }
}
