// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The device record: one physical device and its last-known state.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, de};

use crate::types::{BinaryState, Brightness, DeviceKind};

/// Network location used to reach a device.
///
/// Devices may get a new DHCP lease between sweeps, so an endpoint is never
/// used to identify a device; only the MAC address is.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// Hostname or IP address.
    pub host: String,
    /// UPnP HTTP port.
    pub port: u16,
}

impl Endpoint {
    /// Creates a new endpoint.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Returns the `http://host:port` base URL of the device.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// One discovered device and its last-known state.
///
/// Field names on the wire follow the device description vocabulary
/// (`macAddress`, `friendlyName`, `deviceType`, ...), so cached lists stay
/// readable by other tools.
///
/// # Examples
///
/// ```
/// use wemo_sync::DeviceRecord;
/// use wemo_sync::types::{BinaryState, DeviceKind};
///
/// let lamp = DeviceRecord::new("94103E000001", "Lamp", DeviceKind::Switch, "192.168.1.20", 49153)
///     .with_binary_state(BinaryState::On);
///
/// assert!(lamp.is_on());
/// assert_eq!(lamp.endpoint().base_url(), "http://192.168.1.20:49153");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    /// Hardware address, the durable identity of the device.
    pub mac_address: String,
    /// Human-readable label, also the sort key.
    pub friendly_name: String,
    /// Kind of device.
    #[serde(rename = "deviceType")]
    pub kind: DeviceKind,
    /// Last-known on/off flag, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary_state: Option<BinaryState>,
    /// Last-known brightness, only for dimmers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<Brightness>,
    /// Hostname or IP address.
    pub host: String,
    /// UPnP HTTP port.
    #[serde(deserialize_with = "port_number")]
    pub port: u16,
}

/// Stored port, either `49153` or `"49153"`.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredPort {
    Number(u16),
    Text(String),
}

fn port_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u16, D::Error> {
    match StoredPort::deserialize(deserializer)? {
        StoredPort::Number(port) => Ok(port),
        StoredPort::Text(s) => s
            .trim()
            .parse()
            .map_err(|e| de::Error::custom(format!("invalid port '{s}': {e}"))),
    }
}

impl DeviceRecord {
    /// Creates a record with unknown state.
    #[must_use]
    pub fn new(
        mac_address: impl Into<String>,
        friendly_name: impl Into<String>,
        kind: DeviceKind,
        host: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            mac_address: mac_address.into(),
            friendly_name: friendly_name.into(),
            kind,
            binary_state: None,
            brightness: None,
            host: host.into(),
            port,
        }
    }

    /// Sets the binary state.
    #[must_use]
    pub fn with_binary_state(mut self, state: BinaryState) -> Self {
        self.binary_state = Some(state);
        self
    }

    /// Sets the brightness. Ignored for kinds without brightness support.
    #[must_use]
    pub fn with_brightness(mut self, brightness: Brightness) -> Self {
        if self.kind.supports_brightness() {
            self.brightness = Some(brightness);
        }
        self
    }

    /// Returns the identifier used for equality and merge matching.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.mac_address
    }

    /// Returns where to send commands for this device.
    #[must_use]
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone(), self.port)
    }

    /// Returns true if the last-known flag is exactly on.
    #[must_use]
    pub fn is_on(&self) -> bool {
        self.binary_state.as_ref().is_some_and(BinaryState::is_on)
    }
}
