//! Eviction and promotion policies.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Eviction Module                           │
//! ├──────────────────────────────────────────────────────────────┤
//! │  lru.rs        - Memory tier: oldest `lastAccessed` first    │
//! │                  until the write fits under the ceiling      │
//! ├──────────────────────────────────────────────────────────────┤
//! │  quota.rs      - String tiers: drop a 30% slice of owned     │
//! │                  keys (oldest inserted first), retry once    │
//! ├──────────────────────────────────────────────────────────────┤
//! │  promotion.rs  - Copy hot items (accessCount > 5) toward     │
//! │                  memory, leaving the slower copy in place    │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Memory Eviction
//!
//! Runs inside `MemoryTier::put` so the byte ceiling holds after every write.
//!
//! # Quota Recovery
//!
//! The coordinator drives it: a `QuotaExceeded` from a string tier triggers
//! `CacheTier::evict_for_quota`, then the write is retried exactly once.

pub mod lru;
pub mod quota;
pub mod promotion;
