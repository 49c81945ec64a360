// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Brightness type for dimmer control.
//!
//! This module provides a type-safe representation of dimmer brightness,
//! ensuring values are always within the valid range of 0-100%.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, de};

use crate::error::ValueError;

/// Brightness level as a percentage (0-100).
///
/// Values coming from the wire or from a cache are clamped rather than
/// rejected, so a stored brightness can never leave the valid range. A cached
/// level may be a number or a numeric string.
///
/// # Examples
///
/// ```
/// use wemo_sync::types::{Brightness, Direction};
///
/// let level = Brightness::new(75).unwrap();
/// assert_eq!(level.value(), 75);
///
/// assert_eq!(Brightness::clamped(-5), Brightness::MIN);
/// assert_eq!(Brightness::new(95).unwrap().step(Direction::Up), Brightness::MAX);
///
/// assert!(Brightness::new(101).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(into = "u8")]
pub struct Brightness(u8);

/// Stored level, either `40` or `"40"`.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredLevel {
    Number(i64),
    Text(String),
}

/// Direction of a brightness step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Brighter.
    Up,
    /// Dimmer.
    Down,
}

impl Direction {
    /// Returns `+1` or `-1`.
    #[must_use]
    pub const fn sign(&self) -> i64 {
        match self {
            Self::Up => 1,
            Self::Down => -1,
        }
    }
}

impl Brightness {
    /// Minimum brightness (0%).
    pub const MIN: Self = Self(0);

    /// Maximum brightness (100%).
    pub const MAX: Self = Self(100);

    /// Size of one brightness step.
    pub const STEP: i64 = 10;

    /// Creates a new brightness value.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::OutOfRange` if value exceeds 100.
    pub fn new(value: u8) -> Result<Self, ValueError> {
        if value > 100 {
            return Err(ValueError::OutOfRange {
                min: 0,
                max: 100,
                actual: i64::from(value),
            });
        }
        Ok(Self(value))
    }

    /// Creates a brightness value, clamping to the valid range.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn clamped(value: i64) -> Self {
        // Lossless: the value is within 0..=100 after clamping.
        Self(value.clamp(0, 100) as u8)
    }

    /// Returns the brightness percentage value.
    #[must_use]
    pub const fn value(&self) -> u8 {
        self.0
    }

    /// Returns the level one step away in `direction`, clamped to 0-100.
    #[must_use]
    pub fn step(self, direction: Direction) -> Self {
        Self::clamped(i64::from(self.0) + Self::STEP * direction.sign())
    }
}

impl fmt::Display for Brightness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

impl TryFrom<u8> for Brightness {
    type Error = ValueError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<i64> for Brightness {
    fn from(value: i64) -> Self {
        Self::clamped(value)
    }
}

impl<'de> Deserialize<'de> for Brightness {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match StoredLevel::deserialize(deserializer)? {
            StoredLevel::Number(n) => Ok(Self::clamped(n)),
            StoredLevel::Text(s) => s
                .trim()
                .parse::<i64>()
                .map(Self::clamped)
                .map_err(|e| de::Error::custom(format!("invalid brightness '{s}': {e}"))),
        }
    }
}

impl From<Brightness> for u8 {
    fn from(value: Brightness) -> Self {
        value.0
    }
}
