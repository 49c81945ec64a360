// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device event types.

use std::fmt;

use crate::record::DeviceRecord;

/// Where a replacement device list came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListSource {
    /// The persisted snapshot, possibly stale.
    Cache,
    /// A completed discovery sweep.
    Discovery,
}

impl fmt::Display for ListSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cache => f.write_str("cache"),
            Self::Discovery => f.write_str("discovery"),
        }
    }
}

/// Events emitted by the device service.
///
/// # Examples
///
/// ```
/// use wemo_sync::event::{DeviceEvent, ListSource};
///
/// let event = DeviceEvent::replaced(Vec::new(), ListSource::Discovery);
/// assert!(event.is_list_change());
/// assert!(event.device().is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// The whole list was replaced.
    DevicesReplaced {
        /// The new list, sorted by name.
        devices: Vec<DeviceRecord>,
        /// What produced the list.
        source: ListSource,
    },

    /// A command changed one device.
    ///
    /// Only the commanded field differs from the previous version of the
    /// record.
    DeviceUpdated {
        /// The patched record.
        device: DeviceRecord,
    },

    /// A discovery sweep could not be started.
    ///
    /// The list is unchanged.
    DiscoveryFailed {
        /// Human readable failure reason.
        message: String,
    },

    /// The loading flag changed.
    LoadingChanged {
        /// `true` while a discovery sweep is in flight.
        loading: bool,
    },
}

impl DeviceEvent {
    /// Creates a list replacement event.
    #[must_use]
    pub fn replaced(devices: Vec<DeviceRecord>, source: ListSource) -> Self {
        Self::DevicesReplaced { devices, source }
    }

    /// Creates a single device update event.
    #[must_use]
    pub fn updated(device: DeviceRecord) -> Self {
        Self::DeviceUpdated { device }
    }

    /// Creates a discovery failure event.
    #[must_use]
    pub fn discovery_failed(message: impl Into<String>) -> Self {
        Self::DiscoveryFailed {
            message: message.into(),
        }
    }

    /// Returns the updated device, for [`DeviceEvent::DeviceUpdated`].
    #[must_use]
    pub fn device(&self) -> Option<&DeviceRecord> {
        match self {
            Self::DeviceUpdated { device } => Some(device),
            _ => None,
        }
    }

    /// Returns `true` if the event replaces the whole list.
    #[must_use]
    pub fn is_list_change(&self) -> bool {
        matches!(self, Self::DevicesReplaced { .. })
    }

    /// Returns `true` if the event carries a failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::DiscoveryFailed { .. })
    }
}
