// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Configuration for the device service.

use std::time::Duration;

use crate::cache::DEFAULT_CACHE_KEY;
use crate::discovery::{DEFAULT_DISCOVERY_TIMEOUT, DiscoveryOptions};

/// Default number of events buffered per subscriber.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Configuration for a [`DeviceService`](super::DeviceService).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use wemo_sync::manager::ServiceConfig;
///
/// let config = ServiceConfig::new()
///     .with_discovery_timeout(Duration::from_secs(5))
///     .with_cache_key("wemo-devices");
///
/// assert_eq!(config.discovery_timeout(), Duration::from_secs(5));
/// assert_eq!(config.cache_key(), "wemo-devices");
/// assert_eq!(config.event_capacity(), 256);
/// ```
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    discovery: DiscoveryOptions,
    cache_key: String,
    event_capacity: usize,
}

impl ServiceConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how long each discovery sweep listens for responses.
    #[must_use]
    pub fn with_discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery = self.discovery.with_timeout(timeout);
        self
    }

    /// Sets the discovery options wholesale.
    #[must_use]
    pub fn with_discovery(mut self, options: DiscoveryOptions) -> Self {
        self.discovery = options;
        self
    }

    /// Sets the key the device list is cached under.
    #[must_use]
    pub fn with_cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = key.into();
        self
    }

    /// Sets how many events each subscriber may fall behind before lagging.
    ///
    /// A capacity of zero is raised to one.
    #[must_use]
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    /// Returns the discovery sweep duration.
    #[must_use]
    pub fn discovery_timeout(&self) -> Duration {
        self.discovery.timeout()
    }

    /// Returns the cache key.
    #[must_use]
    pub fn cache_key(&self) -> &str {
        &self.cache_key
    }

    /// Returns the event channel capacity.
    #[must_use]
    pub fn event_capacity(&self) -> usize {
        self.event_capacity
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            discovery: DiscoveryOptions::new().with_timeout(DEFAULT_DISCOVERY_TIMEOUT),
            cache_key: DEFAULT_CACHE_KEY.to_string(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}
