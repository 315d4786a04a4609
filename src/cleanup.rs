// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Periodic expiry sweep.
//!
//! Expired entries are already ignored (and dropped) by reads; the sweep
//! reclaims space held by entries nobody reads again. It runs on its own
//! tokio task and never holds anything a caller operation waits on.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::cache_item::now_millis;
use crate::storage::traits::{CacheTier, TierLevel};

/// Purge expired entries from `tiers` as of `now`.
///
/// The memory tier is always swept; the others only with `include_slow`.
/// Tiers that are not available are skipped and failures are logged, so
/// one broken tier never stops the rest. Returns the total removed.
pub async fn sweep_expired(
    tiers: &[Arc<dyn CacheTier>],
    now: i64,
    include_slow: bool,
    emit_metrics: bool,
) -> usize {
    let mut total = 0;
    for tier in tiers {
        let level = tier.level();
        if level != TierLevel::Memory && !include_slow {
            continue;
        }
        if !tier.is_available() {
            continue;
        }
        match tier.purge_expired(now).await {
            Ok(0) => {}
            Ok(purged) => {
                debug!(tier = %level, purged, "Purged expired entries");
                if emit_metrics {
                    crate::metrics::record_expired(level.as_str(), purged);
                }
                total += purged;
            }
            Err(e) => {
                warn!(tier = %level, error = %e, "Expiry sweep failed");
                if emit_metrics {
                    crate::metrics::record_error(level.as_str(), "purge", e.kind());
                }
            }
        }
    }
    total
}

/// Handle to a running sweep task.
///
/// Dropping the handle aborts the task.
pub struct CleanupHandle {
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl CleanupHandle {
    /// Signal the task to stop and wait for it to exit.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for CleanupHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

pub struct CleanupScheduler;

impl CleanupScheduler {
    /// Start sweeping every `interval`. The first sweep happens one full
    /// interval after spawning.
    pub fn spawn(
        tiers: Vec<Arc<dyn CacheTier>>,
        interval: Duration,
        sweep_slow_tiers: bool,
        emit_metrics: bool,
    ) -> CleanupHandle {
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick completes immediately
            ticker.tick().await;

            info!(interval_secs = interval.as_secs(), sweep_slow_tiers, "Cleanup scheduler started");

            loop {
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        let started = Instant::now();
                        let purged = sweep_expired(&tiers, now_millis(), sweep_slow_tiers, emit_metrics).await;
                        if emit_metrics {
                            crate::metrics::record_cleanup_run(purged, started.elapsed());
                        }
                        debug!(purged, "Cleanup sweep complete");
                    }
                }
            }

            info!("Cleanup scheduler stopped");
        });

        CleanupHandle {
            shutdown,
            task: Some(task),
        }
    }
}
