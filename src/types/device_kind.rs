// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device kinds admitted into a device list.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;

/// The kind of a WeMo device, as advertised by its UPnP device type.
///
/// Only switch-type devices are modelled. Any other UPnP device type
/// (Insight, Maker, bridges, motion sensors...) fails to parse and is
/// discarded at the discovery boundary.
///
/// # Examples
///
/// ```
/// use wemo_sync::types::DeviceKind;
///
/// let kind: DeviceKind = "urn:Belkin:device:dimmer:1".parse().unwrap();
/// assert_eq!(kind, DeviceKind::Dimmer);
/// assert!(kind.supports_brightness());
///
/// assert!("urn:Belkin:device:insight:1".parse::<DeviceKind>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DeviceKind {
    /// Smart plug (`controllee`).
    Switch,
    /// In-wall light switch.
    LightSwitch,
    /// In-wall dimmer.
    Dimmer,
}

impl DeviceKind {
    /// All admitted kinds.
    pub const ALL: [Self; 3] = [Self::Switch, Self::LightSwitch, Self::Dimmer];

    /// Returns the UPnP device type URN for this kind.
    #[must_use]
    pub const fn urn(&self) -> &'static str {
        match self {
            Self::Switch => "urn:Belkin:device:controllee:1",
            Self::LightSwitch => "urn:Belkin:device:lightswitch:1",
            Self::Dimmer => "urn:Belkin:device:dimmer:1",
        }
    }

    /// Returns true if brightness commands apply to this kind.
    #[must_use]
    pub const fn supports_brightness(&self) -> bool {
        matches!(self, Self::Dimmer)
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Switch => f.write_str("switch"),
            Self::LightSwitch => f.write_str("lightswitch"),
            Self::Dimmer => f.write_str("dimmer"),
        }
    }
}

impl FromStr for DeviceKind {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // urn:Belkin:device:<name>:<version>
        let name = s
            .strip_prefix("urn:Belkin:device:")
            .and_then(|rest| rest.split(':').next())
            .ok_or_else(|| ValueError::UnsupportedDeviceType(s.to_string()))?;

        match name {
            "controllee" => Ok(Self::Switch),
            "lightswitch" => Ok(Self::LightSwitch),
            "dimmer" => Ok(Self::Dimmer),
            _ => Err(ValueError::UnsupportedDeviceType(s.to_string())),
        }
    }
}

impl TryFrom<String> for DeviceKind {
    type Error = ValueError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DeviceKind> for String {
    fn from(kind: DeviceKind) -> Self {
        kind.urn().to_string()
    }
}
