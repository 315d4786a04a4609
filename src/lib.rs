//! # Tiered Cache
//!
//! A multi-tier client-side cache with promotion, eviction and TTL expiry.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       memory                                │
//! │  • DashMap, byte ceiling enforced by LRU eviction           │
//! └─────────────────────────────────────────────────────────────┘
//!                              ▲ promotion (accessCount > 5)
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 session  /  local                           │
//! │  • String key/value stores, prefixed keys                   │
//! │  • Quota failure → drop 30% of cache entries, retry once    │
//! └─────────────────────────────────────────────────────────────┘
//!                              ▲
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    structured-db                            │
//! │  • SQLite table with timestamp/ttl indexes                  │
//! │  • Opens in the background; reads skip it until ready       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Reads walk the tiers fastest first. Writes land in one tier and drop any
//! copy held by any other tier. Expired entries are never returned, and a
//! background task sweeps them out periodically.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tiered_cache::{CacheConfig, CacheManager, SetOptions, TierLevel};
//! use serde_json::json;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tiered_cache::CacheError> {
//!     let cache = CacheManager::open(CacheConfig::default()).await?;
//!
//!     cache.set("session:abc", &json!({"user": 42})).await?;
//!     let session: Option<serde_json::Value> = cache.get("session:abc").await;
//!     assert!(session.is_some());
//!
//!     let opts = SetOptions::durable().with_ttl(Duration::from_secs(86_400));
//!     cache.set_with("catalog:v3", &vec!["a", "b"], opts).await?;
//!
//!     let metrics = cache.get_metrics().await;
//!     println!("hit rate: {:.2}", metrics.hit_rate());
//!
//!     cache.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`coordinator`]: the [`CacheManager`] façade and its builder
//! - [`storage`]: tier adapters and their backing stores
//! - [`eviction`]: LRU, quota recovery and promotion policies
//! - [`collector`]: in-process counters behind [`CacheManager::get_metrics`]
//! - [`metrics`]: `metrics` crate export
//! - [`cleanup`]: periodic expiry sweep
//! - [`cacheable`]: read-through wrapper for async functions
//! - [`resilience`]: retry with backoff for the structured store

pub mod config;
pub mod cache_item;
pub mod codec;
pub mod set_options;
pub mod storage;
pub mod eviction;
pub mod resilience;
pub mod collector;
pub mod metrics;
pub mod cleanup;
pub mod cacheable;
pub mod coordinator;

pub use config::CacheConfig;
pub use cache_item::CacheItem;
pub use codec::ItemCodec;
pub use set_options::SetOptions;
pub use coordinator::{CacheManager, CacheManagerBuilder, CacheError, ItemLocation};
pub use storage::traits::{CacheTier, TierLevel, TierStatus, TierError};
pub use collector::{CacheMetrics, MetricsCollector};
pub use cacheable::Cacheable;
pub use resilience::retry::RetryConfig;
pub use metrics::LatencyTimer;
