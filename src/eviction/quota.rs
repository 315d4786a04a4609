// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

/// Default share of a string tier's entries dropped on a quota failure.
pub const DEFAULT_QUOTA_EVICTION_FRACTION: f64 = 0.3;

/// Pick the slice of keys to drop after a quota failure.
///
/// `keys` must be in insertion order (oldest first). Takes
/// `floor(len * fraction)` keys from the front, and at least one whenever
/// any key exists, so a recovery pass always frees something.
pub fn select_victims(keys: &[String], fraction: f64) -> Vec<String> {
    if keys.is_empty() {
        return Vec::new();
    }
    let fraction = fraction.clamp(0.0, 1.0);
    let count = ((keys.len() as f64) * fraction).floor() as usize;
    let count = count.clamp(1, keys.len());
    keys[..count].to_vec()
}
