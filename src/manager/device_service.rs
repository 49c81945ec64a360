// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device service implementation.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, watch};

use super::ServiceConfig;
use crate::cache::{BlobStore, DeviceCache};
use crate::command::{CommandPlan, DeviceCommand};
use crate::discovery::Discovery;
use crate::error::{Error, InvalidCommand, PersistenceError, ProtocolError, ValueError};
use crate::event::{DeviceEvent, EventBus, ListSource};
use crate::protocol::Transport;
use crate::reconcile::reconcile;
use crate::record::DeviceRecord;
use crate::types::Direction;

/// The exposed list and what last produced it.
#[derive(Debug, Default)]
struct DeviceList {
    devices: Vec<DeviceRecord>,
    source: Option<ListSource>,
}

/// Outcome of [`DeviceService::refresh`].
#[derive(Debug)]
pub struct SweepReport {
    devices: Vec<DeviceRecord>,
    cache_warning: Option<PersistenceError>,
    joined: bool,
}

impl SweepReport {
    /// Returns the list after the sweep, sorted by name.
    #[must_use]
    pub fn devices(&self) -> &[DeviceRecord] {
        &self.devices
    }

    /// Consumes the report and returns the list.
    #[must_use]
    pub fn into_devices(self) -> Vec<DeviceRecord> {
        self.devices
    }

    /// Returns the error from persisting the new list, if that failed.
    ///
    /// The in-memory list is valid regardless.
    #[must_use]
    pub fn cache_warning(&self) -> Option<&PersistenceError> {
        self.cache_warning.as_ref()
    }

    /// Returns `true` if this call joined a sweep started by another caller
    /// instead of broadcasting itself.
    #[must_use]
    pub fn is_joined(&self) -> bool {
        self.joined
    }
}

/// How the last completed sweep ended, read by callers that joined it.
#[derive(Debug, Default)]
enum SweepOutcome {
    #[default]
    Succeeded,
    Unavailable(String),
    Rejected(ValueError),
}

impl SweepOutcome {
    fn failed(error: &Error) -> Self {
        match error {
            Error::DiscoveryUnavailable(source) => Self::Unavailable(source.to_string()),
            Error::Value(e) => Self::Rejected(e.clone()),
            other => Self::Unavailable(other.to_string()),
        }
    }

    /// Rebuilds the error the sweep failed with.
    fn error(&self) -> Option<Error> {
        match self {
            Self::Succeeded => None,
            Self::Unavailable(reason) => Some(Error::DiscoveryUnavailable(
                ProtocolError::Joined(reason.clone()),
            )),
            Self::Rejected(e) => Some(Error::Value(e.clone())),
        }
    }
}

/// Raises the loading flag for as long as it lives.
///
/// Only the guard that raised the flag lowers it, so nested guards leave it
/// up until the outermost one drops.
struct LoadingGuard<'a> {
    flag: &'a watch::Sender<bool>,
    events: &'a EventBus,
    raised: bool,
}

impl<'a> LoadingGuard<'a> {
    fn raise(flag: &'a watch::Sender<bool>, events: &'a EventBus) -> Self {
        let raised = !flag.send_replace(true);
        if raised {
            events.publish(DeviceEvent::LoadingChanged { loading: true });
        }
        Self {
            flag,
            events,
            raised,
        }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if self.raised {
            self.flag.send_replace(false);
            self.events.publish(DeviceEvent::LoadingChanged { loading: false });
        }
    }
}

/// Owner of the authoritative device list.
///
/// Readers always see a complete list: the previous one while a sweep is in
/// flight, the reconciled one after, never a mix. The service is `Send +
/// Sync`; wrap it in an [`Arc`] to share it between tasks.
///
/// # Examples
///
/// ```no_run
/// use wemo_sync::cache::MemoryStore;
/// use wemo_sync::manager::DeviceService;
/// use wemo_sync::protocol::WemoTransport;
/// use wemo_sync::types::Direction;
///
/// # async fn example(transport: WemoTransport) -> wemo_sync::Result<()> {
/// let service = DeviceService::new(transport, MemoryStore::new());
/// service.refresh().await?;
///
/// let dimmer = service.devices().into_iter().find(|d| d.kind.supports_brightness());
/// if let Some(dimmer) = dimmer {
///     let patched = service.step_brightness(dimmer.identifier(), Direction::Up).await?;
///     println!("{} now at {:?}", patched.friendly_name, patched.brightness);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct DeviceService<T, S> {
    transport: Arc<T>,
    discovery: Discovery<T>,
    cache: DeviceCache<S>,
    config: ServiceConfig,
    list: RwLock<DeviceList>,
    loading: watch::Sender<bool>,
    /// Held for the whole of a sweep; a second refresh waits on it and
    /// reads how the sweep ended.
    sweep: tokio::sync::Mutex<SweepOutcome>,
    device_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    event_bus: EventBus,
}

impl<T: Transport, S: BlobStore> DeviceService<T, S> {
    /// Creates a service with the default configuration.
    #[must_use]
    pub fn new(transport: T, store: S) -> Self {
        Self::with_config(transport, store, ServiceConfig::default())
    }

    /// Creates a service with a custom configuration.
    #[must_use]
    pub fn with_config(transport: T, store: S, config: ServiceConfig) -> Self {
        let transport = Arc::new(transport);
        let (loading, _) = watch::channel(false);

        Self {
            discovery: Discovery::new(Arc::clone(&transport)),
            transport,
            cache: DeviceCache::new(store).with_key(config.cache_key()),
            event_bus: EventBus::with_capacity(config.event_capacity()),
            config,
            list: RwLock::new(DeviceList::default()),
            loading,
            sweep: tokio::sync::Mutex::new(SweepOutcome::default()),
            device_locks: Mutex::new(HashMap::new()),
        }
    }

    // =========================================================================
    // Observation
    // =========================================================================

    /// Returns a snapshot of the current list, sorted by name.
    #[must_use]
    pub fn devices(&self) -> Vec<DeviceRecord> {
        self.list.read().devices.clone()
    }

    /// Returns the record with the given identifier.
    #[must_use]
    pub fn device(&self, identifier: &str) -> Option<DeviceRecord> {
        self.list
            .read()
            .devices
            .iter()
            .find(|d| d.identifier() == identifier)
            .cloned()
    }

    /// Returns `true` while [`load`](Self::load) or a discovery sweep is in
    /// flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        *self.loading.borrow()
    }

    /// Returns a receiver that sees the loading flag change.
    #[must_use]
    pub fn watch_loading(&self) -> watch::Receiver<bool> {
        self.loading.subscribe()
    }

    /// Subscribes to list and device events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.event_bus.subscribe()
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Returns the device cache.
    #[must_use]
    pub fn cache(&self) -> &DeviceCache<S> {
        &self.cache
    }

    // =========================================================================
    // Synchronization
    // =========================================================================

    /// Shows the cached list, then refreshes it from the network.
    ///
    /// The loading flag is up from before the cache is read until the sweep
    /// has replaced the list. The cached list only replaces an empty list
    /// that no sweep has produced yet; it is published as soon as it is
    /// read, so a caller watching events can render it while discovery runs.
    ///
    /// # Errors
    ///
    /// Same as [`refresh`](Self::refresh). The cached list stays visible if
    /// discovery fails.
    pub async fn load(&self) -> Result<SweepReport, Error> {
        let loading = LoadingGuard::raise(&self.loading, &self.event_bus);
        self.load_cached().await;
        self.run_sweep(loading).await
    }

    /// Replaces the list with the cached one if nothing better is known.
    ///
    /// Returns the list in effect afterwards.
    pub async fn load_cached(&self) -> Vec<DeviceRecord> {
        let cached = self.cache.load().await;

        let devices = {
            let mut list = self.list.write();
            if list.source.is_some() {
                tracing::debug!("Device list already populated, ignoring cache");
                return list.devices.clone();
            }
            list.devices.clone_from(&cached);
            list.source = Some(ListSource::Cache);
            cached
        };

        self.event_bus
            .publish(DeviceEvent::replaced(devices.clone(), ListSource::Cache));
        devices
    }

    /// Runs one discovery sweep and replaces the list with its result.
    ///
    /// If a sweep is already in flight, this waits for it to finish and
    /// shares its result without broadcasting again: the list it left
    /// behind, or the error it failed with.
    ///
    /// A failure to persist the new list does not fail the refresh; it is
    /// reported through [`SweepReport::cache_warning`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::DiscoveryUnavailable`] if the broadcast cannot be
    /// started. The list is left unchanged.
    pub async fn refresh(&self) -> Result<SweepReport, Error> {
        self.run_sweep(LoadingGuard::raise(&self.loading, &self.event_bus))
            .await
    }

    async fn run_sweep(&self, loading: LoadingGuard<'_>) -> Result<SweepReport, Error> {
        let Ok(mut outcome) = self.sweep.try_lock() else {
            tracing::debug!("Discovery sweep in flight, joining it");
            let outcome = self.sweep.lock().await;
            if let Some(e) = outcome.error() {
                return Err(e);
            }
            return Ok(SweepReport {
                devices: self.devices(),
                cache_warning: None,
                joined: true,
            });
        };

        let discovered = match self.discovery.discover(self.config.discovery_timeout()).await {
            Ok(discovered) => discovered,
            Err(e) => {
                tracing::warn!(error = %e, "Discovery sweep failed");
                *outcome = SweepOutcome::failed(&e);
                self.event_bus.publish(DeviceEvent::discovery_failed(e.to_string()));
                return Err(e);
            }
        };
        *outcome = SweepOutcome::Succeeded;

        let devices = {
            let mut list = self.list.write();
            let devices = reconcile(&list.devices, discovered);
            list.devices.clone_from(&devices);
            list.source = Some(ListSource::Discovery);
            devices
        };

        self.prune_device_locks(&devices);
        self.event_bus
            .publish(DeviceEvent::replaced(devices.clone(), ListSource::Discovery));
        drop(loading);

        let cache_warning = match self.cache.save(&devices).await {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to persist device list");
                Some(e)
            }
        };

        Ok(SweepReport {
            devices,
            cache_warning,
            joined: false,
        })
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Flips the on/off state of a device.
    ///
    /// Reads the live state first: `"0"` becomes on, anything else becomes
    /// off. Returns the patched record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCommand`] for an unknown identifier and
    /// [`Error::DeviceCommand`] if the device cannot be read or written. The
    /// list is unchanged on error.
    pub async fn toggle(&self, identifier: &str) -> Result<DeviceRecord, Error> {
        self.execute(identifier, DeviceCommand::Toggle).await
    }

    /// Raises or lowers the brightness of a dimmer by one step.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCommand`] for an unknown identifier or a
    /// device that is not a dimmer, before any network I/O, and
    /// [`Error::DeviceCommand`] if the device cannot be read or written.
    pub async fn step_brightness(
        &self,
        identifier: &str,
        direction: Direction,
    ) -> Result<DeviceRecord, Error> {
        self.execute(identifier, DeviceCommand::StepBrightness(direction))
            .await
    }

    /// Runs `command` against one device and patches its record.
    ///
    /// # Errors
    ///
    /// See [`toggle`](Self::toggle) and [`step_brightness`](Self::step_brightness).
    pub async fn execute(
        &self,
        identifier: &str,
        command: DeviceCommand,
    ) -> Result<DeviceRecord, Error> {
        self.listed(identifier, command)?;

        let lock = self.device_lock(identifier);
        let _serialized = lock.lock().await;

        // A sweep may have moved or removed the device while we waited
        let record = self.listed(identifier, command)?;

        let plan = CommandPlan::fetch(self.transport.as_ref(), &record, command).await?;
        let achieved = plan.apply(self.transport.as_ref()).await?;

        let listed = {
            let mut list = self.list.write();
            list.devices
                .iter_mut()
                .find(|d| d.identifier() == identifier)
                .map(|entry| {
                    achieved.apply_to(entry);
                    entry.clone()
                })
        };

        tracing::info!(mac = %identifier, %command, result = %achieved, "Device command completed");

        match listed {
            Some(patched) => {
                self.event_bus.publish(DeviceEvent::updated(patched.clone()));
                Ok(patched)
            }
            None => {
                tracing::debug!(mac = %identifier, "Device left the list during the command");
                let mut patched = record;
                achieved.apply_to(&mut patched);
                Ok(patched)
            }
        }
    }

    /// Looks up a listed device the command applies to.
    fn listed(&self, identifier: &str, command: DeviceCommand) -> Result<DeviceRecord, Error> {
        let record = self
            .device(identifier)
            .ok_or_else(|| InvalidCommand::UnknownDevice(identifier.to_string()))?;
        command.validate(&record)?;
        Ok(record)
    }

    fn device_lock(&self, identifier: &str) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(
            self.device_locks
                .lock()
                .entry(identifier.to_string())
                .or_default(),
        )
    }

    /// Drops idle locks of devices that are no longer listed.
    fn prune_device_locks(&self, devices: &[DeviceRecord]) {
        self.device_locks.lock().retain(|identifier, lock| {
            Arc::strong_count(lock) > 1 || devices.iter().any(|d| d.identifier() == identifier)
        });
    }
}
