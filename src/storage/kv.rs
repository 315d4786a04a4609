// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! String key/value storage areas backing the session and local tiers.
//!
//! A [`KvBackend`] is a shared storage area with a byte quota, in the spirit
//! of browser Web Storage: other components may keep their own keys in the
//! same area, so the cache only ever touches keys carrying its prefix (see
//! [`super::string_tier::StringTier`]).
//!
//! - [`SessionStore`]: lives for the current process.
//! - [`FileStore`]: durable, persisted as a JSON file on disk.
//!
//! Both report keys in insertion order (rewrites count as fresh inserts) and
//! charge `key.len() + value.len()` bytes per entry against their quota.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum KvError {
    #[error("quota exceeded: need {needed} bytes, capacity {capacity}")]
    QuotaExceeded { needed: usize, capacity: usize },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed store file: {0}")]
    Format(#[from] serde_json::Error),
}

#[async_trait]
pub trait KvBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError>;
    async fn set(&self, key: &str, value: String) -> Result<(), KvError>;
    async fn remove(&self, key: &str) -> Result<(), KvError>;
    /// Remove `key` only while it still holds `expected`.
    ///
    /// Returns whether the entry was removed.
    async fn remove_if(&self, key: &str, expected: &str) -> Result<bool, KvError>;
    /// All keys, oldest insert first.
    async fn keys(&self) -> Result<Vec<String>, KvError>;
    /// Bytes currently charged against the quota.
    async fn used_bytes(&self) -> Result<usize, KvError>;
    fn capacity_bytes(&self) -> usize;
}

#[derive(Debug)]
struct KvEntry {
    seq: u64,
    value: String,
}

/// Map plus quota accounting shared by both backends.
#[derive(Debug, Default)]
struct KvState {
    entries: HashMap<String, KvEntry>,
    next_seq: u64,
    used: usize,
}

impl KvState {
    fn charge(key: &str, value: &str) -> usize {
        key.len() + value.len()
    }

    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|e| e.value.clone())
    }

    fn set(&mut self, key: &str, value: String, capacity: usize) -> Result<(), KvError> {
        let replaced = self
            .entries
            .get(key)
            .map(|e| Self::charge(key, &e.value))
            .unwrap_or(0);
        let projected = self.used - replaced + Self::charge(key, &value);
        if projected > capacity {
            return Err(KvError::QuotaExceeded {
                needed: projected,
                capacity,
            });
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(key.to_string(), KvEntry { seq, value });
        self.used = projected;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some(entry) => {
                self.used -= Self::charge(key, &entry.value);
                true
            }
            None => false,
        }
    }

    fn remove_if(&mut self, key: &str, expected: &str) -> bool {
        match self.entries.get(key) {
            Some(entry) if entry.value == expected => self.remove(key),
            _ => false,
        }
    }

    fn keys(&self) -> Vec<String> {
        let mut ordered: Vec<(&String, u64)> =
            self.entries.iter().map(|(k, e)| (k, e.seq)).collect();
        ordered.sort_by_key(|(_, seq)| *seq);
        ordered.into_iter().map(|(k, _)| k.clone()).collect()
    }

    fn to_persisted(&self) -> PersistedStore {
        let entries = self
            .keys()
            .into_iter()
            .filter_map(|key| {
                self.entries.get(&key).map(|e| PersistedEntry {
                    value: e.value.clone(),
                    key,
                })
            })
            .collect();
        PersistedStore { entries }
    }

    fn from_persisted(store: PersistedStore) -> Self {
        let mut state = Self::default();
        for entry in store.entries {
            state.remove(&entry.key);
            state.used += Self::charge(&entry.key, &entry.value);
            state.entries.insert(
                entry.key,
                KvEntry {
                    seq: state.next_seq,
                    value: entry.value,
                },
            );
            state.next_seq += 1;
        }
        state
    }
}

/// Process-lifetime storage area (the session tier).
pub struct SessionStore {
    state: parking_lot::Mutex<KvState>,
    capacity: usize,
}

impl SessionStore {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            state: parking_lot::Mutex::new(KvState::default()),
            capacity,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KvBackend for SessionStore {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        Ok(self.state.lock().get(key))
    }

    async fn set(&self, key: &str, value: String) -> Result<(), KvError> {
        self.state.lock().set(key, value, self.capacity)
    }

    async fn remove(&self, key: &str) -> Result<(), KvError> {
        self.state.lock().remove(key);
        Ok(())
    }

    async fn remove_if(&self, key: &str, expected: &str) -> Result<bool, KvError> {
        Ok(self.state.lock().remove_if(key, expected))
    }

    async fn keys(&self) -> Result<Vec<String>, KvError> {
        Ok(self.state.lock().keys())
    }

    async fn used_bytes(&self) -> Result<usize, KvError> {
        Ok(self.state.lock().used)
    }

    fn capacity_bytes(&self) -> usize {
        self.capacity
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedStore {
    entries: Vec<PersistedEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedEntry {
    key: String,
    value: String,
}

/// Durable storage area (the local tier), persisted as one JSON file.
///
/// The file is loaded once at open; every mutation rewrites it through a
/// temporary file and an atomic rename. Mutations are serialized by an async
/// mutex held across the write.
pub struct FileStore {
    path: PathBuf,
    state: tokio::sync::Mutex<KvState>,
    capacity: usize,
}

impl FileStore {
    /// Open (or create) the store at `path`.
    pub async fn open(path: impl AsRef<Path>, capacity: usize) -> Result<Self, KvError> {
        let path = path.as_ref().to_path_buf();

        let state = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => KvState::default(),
            Ok(bytes) => {
                let persisted: PersistedStore = serde_json::from_slice(&bytes)?;
                KvState::from_persisted(persisted)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => KvState::default(),
            Err(e) => return Err(e.into()),
        };

        info!(
            path = %path.display(),
            entries = state.entries.len(),
            used_bytes = state.used,
            capacity,
            "Opened durable key/value store"
        );

        Ok(Self {
            path,
            state: tokio::sync::Mutex::new(state),
            capacity,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, state: &KvState) -> Result<(), KvError> {
        let bytes = serde_json::to_vec(&state.to_persisted())?;
        let tmp = self.path.with_extension("tmp");

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), bytes = bytes.len(), "Persisted key/value store");
        Ok(())
    }
}

#[async_trait]
impl KvBackend for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        Ok(self.state.lock().await.get(key))
    }

    async fn set(&self, key: &str, value: String) -> Result<(), KvError> {
        let mut state = self.state.lock().await;
        state.set(key, value, self.capacity)?;
        self.persist(&state).await
    }

    async fn remove(&self, key: &str) -> Result<(), KvError> {
        let mut state = self.state.lock().await;
        if state.remove(key) {
            self.persist(&state).await?;
        }
        Ok(())
    }

    async fn remove_if(&self, key: &str, expected: &str) -> Result<bool, KvError> {
        let mut state = self.state.lock().await;
        let removed = state.remove_if(key, expected);
        if removed {
            self.persist(&state).await?;
        }
        Ok(removed)
    }

    async fn keys(&self) -> Result<Vec<String>, KvError> {
        Ok(self.state.lock().await.keys())
    }

    async fn used_bytes(&self) -> Result<usize, KvError> {
        Ok(self.state.lock().await.used)
    }

    fn capacity_bytes(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_session_set_get_remove() {
        let store = SessionStore::new(1024);

        store.set("a", "1".into()).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), Some("1".to_string()));
        assert_eq!(store.used_bytes().await.unwrap(), 2);

        store.remove("a").await.unwrap();
        assert!(store.get("a").await.unwrap().is_none());
        assert_eq!(store.used_bytes().await.unwrap(), 0);

        // Removing a missing key is fine
        store.remove("a").await.unwrap();
    }

    #[tokio::test]
    async fn test_quota_enforced() {
        let store = SessionStore::new(10);

        store.set("k", "123456789".into()).await.unwrap();
        let err = store.set("k2", "x".into()).await.unwrap_err();

        assert!(matches!(err, KvError::QuotaExceeded { needed: 13, capacity: 10 }));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_overwrite_recharges_quota() {
        let store = SessionStore::new(10);

        store.set("k", "123456789".into()).await.unwrap();
        // Same key, same size: replaced bytes are credited back
        store.set("k", "987654321".into()).await.unwrap();
        assert_eq!(store.used_bytes().await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_keys_in_insertion_order() {
        let store = SessionStore::new(1024);
        for key in ["c", "a", "b"] {
            store.set(key, "v".into()).await.unwrap();
        }
        // Rewrite moves "c" to the back
        store.set("c", "v2".into()).await.unwrap();

        assert_eq!(store.keys().await.unwrap(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_remove_if_only_matching_value() {
        let store = SessionStore::new(1024);
        store.set("k", "new".into()).await.unwrap();

        assert!(!store.remove_if("k", "old").await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some("new".to_string()));
        assert!(!store.remove_if("missing", "old").await.unwrap());

        assert!(store.remove_if("k", "new").await.unwrap());
        assert!(store.is_empty());
        assert_eq!(store.used_bytes().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_file_store_remove_if_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local.json");
        let store = FileStore::open(&path, 1024).await.unwrap();
        store.set("a", "1".into()).await.unwrap();
        store.set("b", "2".into()).await.unwrap();

        assert!(store.remove_if("a", "1").await.unwrap());
        assert!(!store.remove_if("b", "stale").await.unwrap());

        let reopened = FileStore::open(&path, 1024).await.unwrap();
        assert_eq!(reopened.keys().await.unwrap(), vec!["b"]);
    }

    #[tokio::test]
    async fn test_file_store_persists_across_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local.json");

        {
            let store = FileStore::open(&path, 1024).await.unwrap();
            store.set("first", "1".into()).await.unwrap();
            store.set("second", "2".into()).await.unwrap();
            store.remove("first").await.unwrap();
        }

        let reopened = FileStore::open(&path, 1024).await.unwrap();
        assert_eq!(reopened.keys().await.unwrap(), vec!["second"]);
        assert_eq!(reopened.get("second").await.unwrap(), Some("2".to_string()));
        assert_eq!(reopened.used_bytes().await.unwrap(), "second".len() + 1);
    }

    #[tokio::test]
    async fn test_file_store_quota_failure_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local.json");
        let store = FileStore::open(&path, 8).await.unwrap();

        store.set("a", "1234".into()).await.unwrap();
        assert!(matches!(
            store.set("b", "12345678".into()).await,
            Err(KvError::QuotaExceeded { .. })
        ));

        let reopened = FileStore::open(&path, 8).await.unwrap();
        assert_eq!(reopened.keys().await.unwrap(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_file_store_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local.json");
        tokio::fs::write(&path, b"not json").await.unwrap();

        assert!(matches!(FileStore::open(&path, 1024).await, Err(KvError::Format(_))));
    }
}
