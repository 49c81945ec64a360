// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! State-changing device commands.
//!
//! Every command is a read-modify-write against the live device: the current
//! value is fetched from the device (the cached one may be stale because
//! someone flipped the switch by hand), the target is computed from it, and
//! the target is written back. [`CommandPlan`] makes the two network phases
//! explicit.
//!
//! # Available Commands
//!
//! | Command | Applies to | Effect |
//! |---------|------------|--------|
//! | [`DeviceCommand::Toggle`] | all kinds | `"0"` becomes `"1"`, anything else becomes `"0"` |
//! | [`DeviceCommand::StepBrightness`] | dimmers | ±10, clamped to 0-100 |
//!
//! # Examples
//!
//! ```
//! use wemo_sync::command::{DeviceCommand, StateValue};
//! use wemo_sync::types::{BinaryState, Brightness, Direction};
//!
//! let target = DeviceCommand::Toggle.target(&StateValue::Binary(BinaryState::Off));
//! assert_eq!(target, Some(StateValue::Binary(BinaryState::On)));
//!
//! let up = DeviceCommand::StepBrightness(Direction::Up);
//! let target = up.target(&StateValue::Brightness(Brightness::new(95).unwrap()));
//! assert_eq!(target, Some(StateValue::Brightness(Brightness::MAX)));
//! ```

mod plan;

pub use plan::CommandPlan;

use std::fmt;

use crate::error::InvalidCommand;
use crate::record::DeviceRecord;
use crate::types::{BinaryState, Brightness, Direction};

/// A state-changing command for one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceCommand {
    /// Flip the on/off state.
    Toggle,
    /// Change brightness by one step.
    StepBrightness(Direction),
}

impl DeviceCommand {
    /// Returns a short human-readable name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Toggle => "toggle",
            Self::StepBrightness(Direction::Up) => "brightness up",
            Self::StepBrightness(Direction::Down) => "brightness down",
        }
    }

    /// Checks that the command applies to `record`, without any I/O.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidCommand::UnsupportedKind`] for brightness commands on
    /// anything but a dimmer.
    pub fn validate(&self, record: &DeviceRecord) -> Result<(), InvalidCommand> {
        match self {
            Self::StepBrightness(_) if !record.kind.supports_brightness() => {
                Err(InvalidCommand::UnsupportedKind {
                    identifier: record.mac_address.clone(),
                    kind: record.kind,
                    command: self.name(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Computes the value to write given the live `current` value.
    ///
    /// Returns `None` if `current` is not the kind of value this command reads.
    #[must_use]
    pub fn target(&self, current: &StateValue) -> Option<StateValue> {
        match (self, current) {
            (Self::Toggle, StateValue::Binary(state)) => Some(StateValue::Binary(state.toggled())),
            (Self::StepBrightness(direction), StateValue::Brightness(level)) => {
                Some(StateValue::Brightness(level.step(*direction)))
            }
            _ => None,
        }
    }
}

impl fmt::Display for DeviceCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A device state value read or written by a command.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StateValue {
    /// On/off flag.
    Binary(BinaryState),
    /// Dimmer brightness.
    Brightness(Brightness),
}

impl StateValue {
    /// Writes this value into the matching field of `record`.
    ///
    /// No other field is touched.
    pub fn apply_to(&self, record: &mut DeviceRecord) {
        match self {
            Self::Binary(state) => record.binary_state = Some(state.clone()),
            Self::Brightness(level) => record.brightness = Some(*level),
        }
    }
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Binary(state) => write!(f, "state {state}"),
            Self::Brightness(level) => write!(f, "brightness {level}"),
        }
    }
}
