// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Binary (on/off) state of a switch-type device.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The on/off flag reported by a device.
///
/// WeMo devices report their state as a string flag. `"0"` and `"1"` are the
/// canonical values; some firmware reports other values (e.g. `"8"` for
/// standby), which are kept verbatim in [`BinaryState::Other`].
///
/// # Examples
///
/// ```
/// use wemo_sync::types::BinaryState;
///
/// let state: BinaryState = "1".parse().unwrap();
/// assert!(state.is_on());
/// assert_eq!(state.toggled(), BinaryState::Off);
///
/// // Anything that is not exactly "0" flips to off
/// let standby: BinaryState = "8".parse().unwrap();
/// assert!(!standby.is_on());
/// assert_eq!(standby.toggled(), BinaryState::Off);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BinaryState {
    /// `"0"`.
    Off,
    /// `"1"`.
    On,
    /// Any other reported flag.
    Other(String),
}

impl BinaryState {
    /// Returns the wire representation of the flag.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Off => "0",
            Self::On => "1",
            Self::Other(raw) => raw,
        }
    }

    /// Returns true only for the canonical on flag `"1"`.
    #[must_use]
    pub fn is_on(&self) -> bool {
        matches!(self, Self::On)
    }

    /// Returns the canonical state a toggle writes.
    ///
    /// Only an exact `"0"` counts as off; every other flag becomes off.
    #[must_use]
    pub fn toggled(&self) -> Self {
        match self {
            Self::Off => Self::On,
            Self::On | Self::Other(_) => Self::Off,
        }
    }
}

impl fmt::Display for BinaryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BinaryState {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "0" => Self::Off,
            "1" => Self::On,
            other => Self::Other(other.to_string()),
        })
    }
}

impl From<String> for BinaryState {
    fn from(value: String) -> Self {
        match value.trim() {
            "0" => Self::Off,
            "1" => Self::On,
            _ => Self::Other(value),
        }
    }
}

impl From<BinaryState> for String {
    fn from(value: BinaryState) -> Self {
        match value {
            BinaryState::Other(raw) => raw,
            canonical => canonical.as_str().to_string(),
        }
    }
}

impl From<bool> for BinaryState {
    fn from(value: bool) -> Self {
        if value { Self::On } else { Self::Off }
    }
}
