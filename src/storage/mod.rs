// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Storage tiers.
//!
//! | Level          | Adapter                              | Backing                  |
//! |----------------|--------------------------------------|--------------------------|
//! | memory         | [`memory::MemoryTier`]               | `DashMap`, LRU ceiling   |
//! | session        | [`string_tier::StringTier`]          | [`kv::SessionStore`]     |
//! | local          | [`string_tier::StringTier`]          | [`kv::FileStore`]        |
//! | structured-db  | [`deferred::DeferredTier`]           | [`sql::SqlStore`]        |

pub mod traits;
pub mod memory;
pub mod kv;
pub mod string_tier;
pub mod sql;
pub mod deferred;
