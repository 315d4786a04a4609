// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use crate::storage::traits::TierLevel;

/// Reads after which an item served from a slow tier is copied upward.
pub const DEFAULT_PROMOTION_THRESHOLD: u64 = 5;

/// Frequency-based promotion toward the memory tier.
///
/// An item read from a slower tier with `access_count > threshold` is copied
/// one tier closer to memory. The copy carries its access count, so the
/// threshold still holds at the new tier and the item keeps climbing: a read
/// that crosses the threshold ends with the item in every faster tier.
/// Source copies stay where they are.
#[derive(Debug, Clone, Copy)]
pub struct PromotionPolicy {
    pub threshold: u64,
}

impl Default for PromotionPolicy {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_PROMOTION_THRESHOLD,
        }
    }
}

impl PromotionPolicy {
    #[must_use]
    pub fn new(threshold: u64) -> Self {
        Self { threshold }
    }

    #[must_use]
    pub fn is_hot(&self, access_count: u64) -> bool {
        access_count > self.threshold
    }

    /// Tiers to copy into, nearest first, for an item just read from `from`.
    #[must_use]
    pub fn promotion_path(&self, from: TierLevel, access_count: u64) -> Vec<TierLevel> {
        let mut path = Vec::new();
        if !self.is_hot(access_count) {
            return path;
        }
        let mut current = from;
        while let Some(next) = current.faster() {
            path.push(next);
            current = next;
        }
        path
    }
}
