// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Manager construction with injectable backends.

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use crate::cleanup::CleanupScheduler;
use crate::codec::ItemCodec;
use crate::collector::MetricsCollector;
use crate::config::CacheConfig;
use crate::eviction::promotion::PromotionPolicy;
use crate::storage::deferred::DeferredTier;
use crate::storage::kv::{FileStore, KvBackend, SessionStore};
use crate::storage::memory::MemoryTier;
use crate::storage::sql::SqlStore;
use crate::storage::string_tier::StringTier;
use crate::storage::traits::{CacheTier, TierLevel};

use super::{CacheError, CacheManager};

/// Builder for [`CacheManager`].
///
/// Anything not supplied is built from the [`CacheConfig`].
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use tiered_cache::{CacheConfig, CacheManager, TierLevel};
/// use tiered_cache::storage::kv::SessionStore;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), tiered_cache::CacheError> {
/// let shared_session = Arc::new(SessionStore::new(5 * 1024 * 1024));
///
/// let cache = CacheManager::builder(CacheConfig::default())
///     .session_backend(shared_session)
///     .disable(TierLevel::StructuredDb)
///     .build()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct CacheManagerBuilder {
    config: CacheConfig,
    session_backend: Option<Arc<dyn KvBackend>>,
    local_backend: Option<Arc<dyn KvBackend>>,
    overrides: [Option<Arc<dyn CacheTier>>; 4],
    disabled: Vec<TierLevel>,
}

impl CacheManagerBuilder {
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            session_backend: None,
            local_backend: None,
            overrides: Default::default(),
            disabled: Vec::new(),
        }
    }

    /// Storage area behind the session tier (shared with other users of it).
    #[must_use]
    pub fn session_backend(mut self, backend: Arc<dyn KvBackend>) -> Self {
        self.session_backend = Some(backend);
        self
    }

    /// Storage area behind the local tier.
    #[must_use]
    pub fn local_backend(mut self, backend: Arc<dyn KvBackend>) -> Self {
        self.local_backend = Some(backend);
        self
    }

    /// Replace the adapter for one level entirely.
    #[must_use]
    pub fn tier(mut self, level: TierLevel, tier: Arc<dyn CacheTier>) -> Self {
        self.overrides[level.index()] = Some(tier);
        self
    }

    /// Never open or consult `level`.
    #[must_use]
    pub fn disable(mut self, level: TierLevel) -> Self {
        self.disabled.push(level);
        self
    }

    pub async fn build(self) -> Result<CacheManager, CacheError> {
        let Self {
            mut config,
            session_backend,
            local_backend,
            mut overrides,
            disabled,
        } = self;

        config.validate()?;
        for level in disabled {
            if !config.disabled_tiers.contains(&level) {
                config.disabled_tiers.push(level);
            }
        }

        for (index, tier) in overrides.iter().enumerate() {
            if let Some(tier) = tier {
                if tier.level().index() != index {
                    return Err(CacheError::InvalidConfig(format!(
                        "{} tier adapter registered at {} level",
                        tier.level(),
                        TierLevel::ALL[index]
                    )));
                }
            }
        }

        let codec = ItemCodec::new(config.enable_compression);
        let emit_metrics = config.enable_metrics;
        let mut tiers: [Option<Arc<dyn CacheTier>>; 4] = Default::default();

        for level in TierLevel::ALL {
            if config.is_disabled(level) {
                info!(tier = %level, "Tier disabled by configuration");
                continue;
            }
            if let Some(tier) = overrides[level.index()].take() {
                tiers[level.index()] = Some(tier);
                continue;
            }

            let tier: Option<Arc<dyn CacheTier>> = match level {
                TierLevel::Memory => {
                    Some(Arc::new(MemoryTier::new(config.max_memory_size)) as Arc<dyn CacheTier>)
                }
                TierLevel::Session => {
                    let backend = match session_backend.clone() {
                        Some(backend) => backend,
                        None => Arc::new(SessionStore::new(config.max_session_size)) as Arc<dyn KvBackend>,
                    };
                    Some(Arc::new(StringTier::new(level, backend, config.key_prefix.clone(), codec))
                        as Arc<dyn CacheTier>)
                }
                TierLevel::Local => {
                    let backend = match local_backend.clone() {
                        Some(backend) => Some(backend),
                        None => open_local(&config, emit_metrics).await,
                    };
                    backend.map(|backend| {
                        Arc::new(StringTier::new(level, backend, config.key_prefix.clone(), codec))
                            as Arc<dyn CacheTier>
                    })
                }
                TierLevel::StructuredDb => {
                    let path = config.db_path();
                    let deferred = DeferredTier::spawn(level, async move {
                        let started = Instant::now();
                        let opened = SqlStore::open_path(&path).await;
                        if emit_metrics {
                            crate::metrics::record_tier_open(level.as_str(), opened.is_ok(), started.elapsed());
                        }
                        opened
                    });
                    Some(Arc::new(deferred) as Arc<dyn CacheTier>)
                }
            };
            tiers[level.index()] = tier;
        }

        let cleanup = config.cleanup_interval().map(|interval| {
            CleanupScheduler::spawn(
                tiers.iter().flatten().cloned().collect(),
                interval,
                config.sweep_slow_tiers,
                emit_metrics,
            )
        });

        info!(
            memory = tiers[0].is_some(),
            session = tiers[1].is_some(),
            local = tiers[2].is_some(),
            structured_db = tiers[3].is_some(),
            max_memory_size = config.max_memory_size,
            default_ttl_ms = config.default_ttl_ms,
            "Cache manager built"
        );

        Ok(CacheManager {
            collector: Arc::new(MetricsCollector::new(config.enable_metrics)),
            promotion: PromotionPolicy::new(config.promotion_threshold),
            cleanup: parking_lot::Mutex::new(cleanup),
            tiers,
            config,
        })
    }
}

/// Open the durable local store; failure disables the tier, not the cache.
async fn open_local(config: &CacheConfig, emit_metrics: bool) -> Option<Arc<dyn KvBackend>> {
    let path = config.local_path();
    let started = Instant::now();
    let opened = FileStore::open(&path, config.max_local_size).await;
    if emit_metrics {
        crate::metrics::record_tier_open(TierLevel::Local.as_str(), opened.is_ok(), started.elapsed());
    }
    match opened {
        Ok(store) => Some(Arc::new(store) as Arc<dyn KvBackend>),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Local store unavailable, tier disabled");
            None
        }
    }
}
