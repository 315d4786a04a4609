// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Read-through caching for async functions.
//!
//! [`Cacheable`] wraps a fallible async function and memoizes its `Ok`
//! results in a [`CacheManager`], keyed by a qualifying name plus the JSON
//! form of the arguments.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tiered_cache::{Cacheable, CacheConfig, CacheManager, TierLevel};
//!
//! async fn fetch_profile(user_id: u64) -> Result<String, std::io::Error> {
//!     Ok(format!("profile-{user_id}"))
//! }
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cache = Arc::new(CacheManager::open(CacheConfig::default()).await?);
//!
//! let profiles = Cacheable::new(cache, "UserService::fetch_profile", fetch_profile)
//!     .ttl(Duration::from_secs(300))
//!     .level(TierLevel::Session);
//!
//! // Computed once, then served from the cache
//! let first = profiles.call(42).await?;
//! let second = profiles.call(42).await?;
//! assert_eq!(first, second);
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::coordinator::CacheManager;
use crate::set_options::SetOptions;
use crate::storage::traits::TierLevel;

/// Caching wrapper around an async function `F: Fn(A) -> Future<Output = Result<R, E>>`.
pub struct Cacheable<F> {
    cache: Arc<CacheManager>,
    name: String,
    options: SetOptions,
    f: F,
}

impl<F> Cacheable<F> {
    /// `name` qualifies the cache keys, e.g. `"UserService::fetch_profile"`.
    pub fn new(cache: Arc<CacheManager>, name: impl Into<String>, f: F) -> Self {
        Self {
            cache,
            name: name.into(),
            options: SetOptions::default(),
            f,
        }
    }

    /// TTL for stored results (default: the cache's default TTL).
    #[must_use]
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.options = self.options.with_ttl(ttl);
        self
    }

    /// Tier that receives stored results (default: memory).
    #[must_use]
    pub fn level(mut self, level: TierLevel) -> Self {
        self.options = self.options.with_level(level);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cache key for `args`: `{name}_{json(args)}`.
    ///
    /// `None` if the arguments do not serialize.
    pub fn key_for<A: Serialize + ?Sized>(&self, args: &A) -> Option<String> {
        serde_json::to_string(args)
            .ok()
            .map(|json| format!("{}_{}", self.name, json))
    }

    /// Return the cached result for `args`, or run the function and cache
    /// an `Ok` result.
    ///
    /// Errors are passed through and never cached. A failed cache write is
    /// logged; the computed result is still returned. Arguments that do not
    /// serialize bypass the cache entirely.
    pub async fn call<A, R, E, Fut>(&self, args: A) -> Result<R, E>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<R, E>>,
        A: Serialize,
        R: Serialize + DeserializeOwned,
    {
        let Some(key) = self.key_for(&args) else {
            warn!(name = %self.name, "Arguments not serializable, bypassing cache");
            return (self.f)(args).await;
        };

        if let Some(cached) = self.cache.get::<R>(&key).await {
            debug!(key = %key, "Cacheable hit");
            return Ok(cached);
        }

        let result = (self.f)(args).await?;
        if let Err(e) = self.cache.set_with(&key, &result, self.options).await {
            warn!(key = %key, error = %e, "Failed to cache result");
        }
        Ok(result)
    }
}
