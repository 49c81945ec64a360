// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Key/value blob stores backing the device cache.

use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::error::PersistenceError;

/// A persistent string store addressed by key.
///
/// `set` replaces the whole value; a concurrent `get` observes either the
/// previous value or the new one, never a mix.
pub trait BlobStore: Send + Sync {
    /// Reads the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError` if the backend cannot be read. A missing
    /// key is not an error and yields `Ok(None)`.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, PersistenceError>> + Send;

    /// Stores `value` under `key`, overwriting any previous value.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError` if the backend cannot be written.
    fn set(&self, key: &str, value: String) -> impl Future<Output = Result<(), PersistenceError>> + Send;
}

// ============================================================================
// MemoryStore
// ============================================================================

/// In-process store, useful for tests and short-lived tools.
///
/// # Examples
///
/// ```
/// use wemo_sync::cache::{BlobStore, MemoryStore};
///
/// # async fn example() -> Result<(), wemo_sync::error::PersistenceError> {
/// let store = MemoryStore::new();
/// store.set("devices", "[]".to_string()).await?;
/// assert_eq!(store.get("devices").await?.as_deref(), Some("[]"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with one value.
    #[must_use]
    pub fn with_value(key: impl Into<String>, value: impl Into<String>) -> Self {
        let store = Self::new();
        store.values.write().insert(key.into(), value.into());
        store
    }

    /// Returns the current value under `key` without going through the trait.
    #[must_use]
    pub fn snapshot(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }
}

impl BlobStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.snapshot(key))
    }

    async fn set(&self, key: &str, value: String) -> Result<(), PersistenceError> {
        self.values.write().insert(key.to_string(), value);
        Ok(())
    }
}

// ============================================================================
// FileStore
// ============================================================================

/// Distinguishes temp files of concurrent writers in one process.
static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Stores each key as `<dir>/<key>.json`.
///
/// Writes go to a temporary file in the same directory which is then renamed
/// over the target, so readers never see a partially written value.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Creates a store rooted at `dir`. The directory is created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the root directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the file path used for `key`.
    #[must_use]
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl BlobStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<(), PersistenceError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let target = self.path_for(key);
        let temp = self.dir.join(format!(
            ".{key}.{}.{}.tmp",
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        tokio::fs::write(&temp, value).await?;
        if let Err(e) = tokio::fs::rename(&temp, &target).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e.into());
        }

        tracing::debug!(path = %target.display(), "Wrote blob");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_missing_key() {
        let store = MemoryStore::new();
        assert_eq!(store.get("devices").await.unwrap(), None);
    }

    #[tokio::test]
    async fn memory_store_overwrites() {
        let store = MemoryStore::with_value("devices", "old");
        store.set("devices", "new".to_string()).await.unwrap();
        assert_eq!(store.get("devices").await.unwrap().as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested"));

        assert_eq!(store.get("devices").await.unwrap(), None);

        store.set("devices", "first".to_string()).await.unwrap();
        store.set("devices", "second".to_string()).await.unwrap();
        assert_eq!(store.get("devices").await.unwrap().as_deref(), Some("second"));
        assert!(store.path_for("devices").exists());
    }

    #[tokio::test]
    async fn file_store_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        store.set("devices", "value".to_string()).await.unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(entries, vec!["devices.json".to_string()]);
    }

    #[tokio::test]
    async fn file_store_unreadable_path_is_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be
        std::fs::create_dir(dir.path().join("devices.json")).unwrap();
        let store = FileStore::new(dir.path());
        assert!(store.get("devices").await.is_err());
    }
}
