// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! SQLite storage backend for the structured-db tier.
//!
//! Items are stored as rows, one column per envelope field, so the payload
//! stays a structured JSON document rather than an opaque blob:
//!
//! ```sql
//! CREATE TABLE cache_entries (
//!   key TEXT PRIMARY KEY,
//!   data TEXT NOT NULL,            -- JSON payload
//!   timestamp INTEGER NOT NULL,    -- write time, epoch millis
//!   ttl INTEGER NOT NULL,          -- millis
//!   access_count INTEGER NOT NULL,
//!   last_accessed INTEGER NOT NULL,
//!   size INTEGER NOT NULL
//! )
//! ```
//!
//! Expiry sweeps run on the `timestamp` and `ttl` indexes.
//!
//! ## Schema versioning
//!
//! The schema version lives in `PRAGMA user_version`. On open, any version
//! below [`SCHEMA_VERSION`] is upgraded in place and the pragma bumped.

use std::path::Path;
use std::sync::Once;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::{any::AnyPoolOptions, AnyPool, Row};
use tracing::{debug, info};

use crate::cache_item::CacheItem;
use crate::resilience::retry::{retry, RetryConfig};
use super::traits::{CacheTier, PutReceipt, TierError, TierLevel};

pub const SCHEMA_VERSION: i64 = 1;

// SQLx `Any` driver requires runtime installation
static INSTALL_DRIVERS: Once = Once::new();

fn install_drivers() {
    INSTALL_DRIVERS.call_once(|| {
        sqlx::any::install_default_drivers();
    });
}

fn backend(e: sqlx::Error) -> TierError {
    TierError::Backend(e.to_string())
}

pub struct SqlStore {
    pool: AnyPool,
}

impl SqlStore {
    /// Open the database file at `path`, creating it if needed.
    pub async fn open_path(path: impl AsRef<Path>) -> Result<Self, TierError> {
        let url = format!("sqlite://{}?mode=rwc", path.as_ref().display());
        Self::open(&url).await
    }

    /// Connect with startup-mode retry, then bring the schema up to date.
    pub async fn open(connection_string: &str) -> Result<Self, TierError> {
        install_drivers();

        // Every connection to `:memory:` is a separate database
        let max_connections = if connection_string.contains(":memory:") { 1 } else { 4 };

        let pool = retry("sqlite_connect", &RetryConfig::startup(), || async {
            AnyPoolOptions::new()
                .max_connections(max_connections)
                .acquire_timeout(Duration::from_secs(10))
                .connect(connection_string)
                .await
                .map_err(backend)
        })
        .await?;

        let store = Self { pool };
        store.enable_wal_mode().await?;
        retry("sqlite_migrate", &RetryConfig::startup(), || store.migrate()).await?;

        info!(url = connection_string, "Structured tier opened");
        Ok(store)
    }

    async fn enable_wal_mode(&self) -> Result<(), TierError> {
        sqlx::query("PRAGMA journal_mode = WAL")
            .execute(&self.pool)
            .await
            .map_err(|e| TierError::Backend(format!("Failed to enable WAL mode: {}", e)))?;

        sqlx::query("PRAGMA synchronous = NORMAL")
            .execute(&self.pool)
            .await
            .map_err(|e| TierError::Backend(format!("Failed to set synchronous mode: {}", e)))?;

        Ok(())
    }

    /// Stored schema version (0 for a fresh database).
    pub async fn schema_version(&self) -> Result<i64, TierError> {
        let row = sqlx::query("PRAGMA user_version")
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?;
        row.try_get::<i64, _>(0).map_err(backend)
    }

    async fn migrate(&self) -> Result<(), TierError> {
        let current = self.schema_version().await?;
        if current >= SCHEMA_VERSION {
            return Ok(());
        }

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cache_entries (
                key TEXT PRIMARY KEY,
                data TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                ttl INTEGER NOT NULL,
                access_count INTEGER NOT NULL DEFAULT 0,
                last_accessed INTEGER NOT NULL DEFAULT 0,
                size INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_cache_entries_timestamp ON cache_entries (timestamp)")
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_cache_entries_ttl ON cache_entries (ttl)")
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        // Pragmas take no bind parameters
        sqlx::query(&format!("PRAGMA user_version = {}", SCHEMA_VERSION))
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        info!(from = current, to = SCHEMA_VERSION, "Migrated structured tier schema");
        Ok(())
    }

    /// Number of stored rows, expired or not.
    pub async fn count(&self) -> Result<u64, TierError> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM cache_entries")
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?;
        let count: i64 = row.try_get("cnt").map_err(backend)?;
        Ok(count as u64)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl CacheTier for SqlStore {
    fn level(&self) -> TierLevel {
        TierLevel::StructuredDb
    }

    async fn get(&self, key: &str) -> Result<Option<CacheItem>, TierError> {
        let row = sqlx::query(
            "SELECT data, timestamp, ttl, access_count, last_accessed, size FROM cache_entries WHERE key = ?",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        let Some(row) = row else {
            return Ok(None);
        };

        // TEXT may surface as bytes through the Any driver
        let data_text: String = match row.try_get::<String, _>("data") {
            Ok(s) => s,
            Err(_) => row
                .try_get::<Vec<u8>, _>("data")
                .ok()
                .and_then(|bytes| String::from_utf8(bytes).ok())
                .ok_or_else(|| TierError::Deserialization {
                    key: key.to_string(),
                    reason: "data column is not text".to_string(),
                })?,
        };
        let data = serde_json::from_str(&data_text).map_err(|e| TierError::Deserialization {
            key: key.to_string(),
            reason: e.to_string(),
        })?;

        let timestamp: i64 = row.try_get("timestamp").map_err(backend)?;
        let ttl: i64 = row.try_get("ttl").map_err(backend)?;
        let access_count: i64 = row.try_get("access_count").unwrap_or(0);
        let last_accessed: i64 = row.try_get("last_accessed").unwrap_or(timestamp);
        let size: i64 = row.try_get("size").unwrap_or(0);

        Ok(Some(CacheItem {
            data,
            timestamp,
            ttl: ttl.max(0) as u64,
            access_count: access_count.max(0) as u64,
            last_accessed,
            size: size.max(0) as usize,
        }))
    }

    async fn put(&self, key: &str, item: &CacheItem) -> Result<PutReceipt, TierError> {
        let data = serde_json::to_string(&item.data).map_err(|e| TierError::Backend(e.to_string()))?;
        let ttl = item.ttl.min(i64::MAX as u64) as i64;

        retry("sqlite_put", &RetryConfig::query(), || async {
            sqlx::query(
                "INSERT INTO cache_entries (key, data, timestamp, ttl, access_count, last_accessed, size)
                 VALUES (?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(key) DO UPDATE SET
                    data = excluded.data,
                    timestamp = excluded.timestamp,
                    ttl = excluded.ttl,
                    access_count = excluded.access_count,
                    last_accessed = excluded.last_accessed,
                    size = excluded.size",
            )
            .bind(key)
            .bind(data.as_str())
            .bind(item.timestamp)
            .bind(ttl)
            .bind(item.access_count as i64)
            .bind(item.last_accessed)
            .bind(item.size as i64)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
            Ok(PutReceipt::default())
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<(), TierError> {
        sqlx::query("DELETE FROM cache_entries WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), TierError> {
        let result = sqlx::query("DELETE FROM cache_entries")
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        debug!(removed = result.rows_affected(), "Cleared structured tier");
        Ok(())
    }

    async fn record_access(&self, key: &str, item: &CacheItem) -> Result<(), TierError> {
        sqlx::query("UPDATE cache_entries SET access_count = ?, last_accessed = ? WHERE key = ?")
            .bind(item.access_count as i64)
            .bind(item.last_accessed)
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn purge_expired(&self, now: i64) -> Result<usize, TierError> {
        let result = sqlx::query("DELETE FROM cache_entries WHERE timestamp + ttl <= ?")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(result.rows_affected() as usize)
    }

    async fn usage_bytes(&self) -> Result<usize, TierError> {
        let row = sqlx::query("SELECT COALESCE(SUM(size), 0) AS total FROM cache_entries")
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?;
        let total: i64 = row.try_get("total").map_err(backend)?;
        Ok(total.max(0) as usize)
    }
}
