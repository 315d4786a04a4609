// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for the cache.
//!
//! # Example
//!
//! ```
//! use tiered_cache::CacheConfig;
//!
//! // Minimal config (uses defaults)
//! let config = CacheConfig::default();
//! assert_eq!(config.max_memory_size, 50 * 1024 * 1024); // 50 MB
//! assert_eq!(config.default_ttl_ms, 30 * 60 * 1000);    // 30 min
//!
//! // Tuned config
//! let config = CacheConfig {
//!     max_memory_size: 8 * 1024 * 1024,
//!     db_path: Some("/var/lib/app/cache.db".into()),
//!     enable_compression: false,
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::coordinator::CacheError;
use crate::storage::traits::TierLevel;

/// Configuration for the cache.
///
/// Immutable once a manager is built from it.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Memory tier ceiling in bytes (default: 50 MB)
    #[serde(default = "default_max_memory_size")]
    pub max_memory_size: usize,

    /// Session store quota in bytes (default: 5 MB)
    #[serde(default = "default_max_session_size")]
    pub max_session_size: usize,

    /// Durable local store quota in bytes (default: 10 MB)
    #[serde(default = "default_max_local_size")]
    pub max_local_size: usize,

    /// TTL applied when a write names none (default: 30 min)
    #[serde(default = "default_ttl_ms")]
    pub default_ttl_ms: u64,

    /// Base64 pass over items in the string tiers
    #[serde(default = "default_true")]
    pub enable_compression: bool,

    /// Response-time tracking and metric emission
    #[serde(default = "default_true")]
    pub enable_metrics: bool,

    /// Namespace for cache keys in the shared string stores
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Durable local store file (default: `./tiered_cache_local.json`)
    #[serde(default)]
    pub local_path: Option<PathBuf>,

    /// SQLite database file (default: `./tiered_cache.db`)
    #[serde(default)]
    pub db_path: Option<PathBuf>,

    /// Tiers never opened or consulted
    #[serde(default)]
    pub disabled_tiers: Vec<TierLevel>,

    /// Expiry sweep period in seconds (0 = no background sweep)
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,

    /// Also sweep session/local/structured-db, not just memory
    #[serde(default = "default_true")]
    pub sweep_slow_tiers: bool,

    /// Reads after which an item is copied toward memory
    #[serde(default = "default_promotion_threshold")]
    pub promotion_threshold: u64,

    /// Share of a string tier's entries dropped on a quota failure
    #[serde(default = "default_quota_eviction_fraction")]
    pub quota_eviction_fraction: f64,
}

fn default_max_memory_size() -> usize { 50 * 1024 * 1024 } // 50 MB
fn default_max_session_size() -> usize { 5 * 1024 * 1024 } // 5 MB
fn default_max_local_size() -> usize { 10 * 1024 * 1024 } // 10 MB
fn default_ttl_ms() -> u64 { 30 * 60 * 1000 }
fn default_true() -> bool { true }
fn default_key_prefix() -> String { "cache_".to_string() }
fn default_cleanup_interval_secs() -> u64 { 600 }
fn default_promotion_threshold() -> u64 { crate::eviction::promotion::DEFAULT_PROMOTION_THRESHOLD }
fn default_quota_eviction_fraction() -> f64 { crate::eviction::quota::DEFAULT_QUOTA_EVICTION_FRACTION }

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_memory_size: default_max_memory_size(),
            max_session_size: default_max_session_size(),
            max_local_size: default_max_local_size(),
            default_ttl_ms: default_ttl_ms(),
            enable_compression: true,
            enable_metrics: true,
            key_prefix: default_key_prefix(),
            local_path: None,
            db_path: None,
            disabled_tiers: Vec::new(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
            sweep_slow_tiers: true,
            promotion_threshold: default_promotion_threshold(),
            quota_eviction_fraction: default_quota_eviction_fraction(),
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> Result<(), CacheError> {
        if self.default_ttl_ms == 0 {
            return Err(CacheError::InvalidConfig("default_ttl_ms must be > 0".into()));
        }
        if self.max_memory_size == 0 {
            return Err(CacheError::InvalidConfig("max_memory_size must be > 0".into()));
        }
        if !(self.quota_eviction_fraction > 0.0 && self.quota_eviction_fraction <= 1.0) {
            return Err(CacheError::InvalidConfig(format!(
                "quota_eviction_fraction must be in (0, 1], got {}",
                self.quota_eviction_fraction
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.default_ttl_ms)
    }

    #[must_use]
    pub fn is_disabled(&self, level: TierLevel) -> bool {
        self.disabled_tiers.contains(&level)
    }

    #[must_use]
    pub fn local_path(&self) -> PathBuf {
        self.local_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("tiered_cache_local.json"))
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("tiered_cache.db"))
    }

    /// Zero disables the background sweep.
    #[must_use]
    pub fn cleanup_interval(&self) -> Option<Duration> {
        (self.cleanup_interval_secs > 0).then(|| Duration::from_secs(self.cleanup_interval_secs))
    }
}
