// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Persistence of the last known device list.
//!
//! The cache stores the whole list as one JSON document under a fixed key.
//! Loading never fails: a missing, unreadable or malformed blob yields an
//! empty list, since the next discovery sweep repopulates it anyway.

mod store;

pub use store::{BlobStore, FileStore, MemoryStore};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PersistenceError;
use crate::reconcile::normalize;
use crate::record::DeviceRecord;

/// Key the device list is stored under unless configured otherwise.
pub const DEFAULT_CACHE_KEY: &str = "devices";

/// Current payload version.
const PAYLOAD_VERSION: u32 = 1;

#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    saved_at: DateTime<Utc>,
    devices: &'a [DeviceRecord],
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Payload {
    Snapshot {
        version: u32,
        #[serde(default)]
        saved_at: Option<DateTime<Utc>>,
        devices: Vec<DeviceRecord>,
    },
    /// A bare array of records.
    Bare(Vec<DeviceRecord>),
}

/// Loads and saves the device list through a [`BlobStore`].
///
/// # Examples
///
/// ```
/// use wemo_sync::cache::{DeviceCache, MemoryStore};
///
/// # async fn example() {
/// let cache = DeviceCache::new(MemoryStore::new());
/// assert!(cache.load().await.is_empty());
/// # }
/// ```
#[derive(Debug)]
pub struct DeviceCache<S> {
    store: S,
    key: String,
}

impl<S: BlobStore> DeviceCache<S> {
    /// Creates a cache using [`DEFAULT_CACHE_KEY`].
    #[must_use]
    pub fn new(store: S) -> Self {
        Self {
            store,
            key: DEFAULT_CACHE_KEY.to_string(),
        }
    }

    /// Uses a different key.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Returns the key the list is stored under.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Loads the cached list, sorted and free of duplicate identifiers.
    ///
    /// Returns an empty list when nothing usable is stored.
    pub async fn load(&self) -> Vec<DeviceRecord> {
        let blob = match self.store.get(&self.key).await {
            Ok(Some(blob)) => blob,
            Ok(None) => {
                tracing::info!(key = %self.key, "No cached device list");
                return Vec::new();
            }
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "Failed to read device cache");
                return Vec::new();
            }
        };

        match decode(&blob) {
            Ok(devices) => {
                tracing::info!(key = %self.key, count = devices.len(), "Loaded cached devices");
                normalize(devices)
            }
            Err(reason) => {
                tracing::warn!(key = %self.key, %reason, "Ignoring malformed device cache");
                Vec::new()
            }
        }
    }

    /// Replaces the cached list with `devices`.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError` if the list cannot be serialized or written.
    pub async fn save(&self, devices: &[DeviceRecord]) -> Result<(), PersistenceError> {
        let payload = serde_json::to_string(&SnapshotRef {
            version: PAYLOAD_VERSION,
            saved_at: Utc::now(),
            devices,
        })?;

        self.store.set(&self.key, payload).await?;

        tracing::info!(key = %self.key, count = devices.len(), "Saved device cache");
        Ok(())
    }
}

/// Decodes a stored payload, describing why it was rejected.
fn decode(blob: &str) -> Result<Vec<DeviceRecord>, String> {
    match serde_json::from_str::<Payload>(blob).map_err(|e| e.to_string())? {
        Payload::Snapshot {
            version, devices, ..
        } if version == PAYLOAD_VERSION => Ok(devices),
        Payload::Snapshot { version, .. } => Err(format!("unsupported payload version {version}")),
        Payload::Bare(devices) => Ok(devices),
    }
}
