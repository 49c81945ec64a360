// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `wemo_sync` library.
//!
//! The hierarchy mirrors the places a failure can originate: the network
//! transport, the persistent cache, a single device command, or a command
//! that was never valid to begin with.

use std::fmt;

use thiserror::Error;

use crate::types::DeviceKind;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// The discovery broadcast could not be started (no usable network
    /// interface, socket bind failure, ...).
    #[error("discovery unavailable: {0}")]
    DiscoveryUnavailable(#[source] ProtocolError),

    /// Reading or writing the persistent cache failed.
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// A device was unreachable or rejected a command.
    #[error("command for device {identifier} failed during {phase}: {source}")]
    DeviceCommand {
        /// Identifier (MAC address) of the target device.
        identifier: String,
        /// The phase the command was in when it failed.
        phase: CommandPhase,
        /// The underlying transport failure.
        source: ProtocolError,
    },

    /// The command does not apply to the target, checked before any network I/O.
    #[error("invalid command: {0}")]
    InvalidCommand(#[from] InvalidCommand),

    /// An argument was outside its allowed range.
    #[error("value error: {0}")]
    Value(#[from] ValueError),
}

/// The phase of a read-modify-write device command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandPhase {
    /// Fetching the live state from the device.
    Read,
    /// Sending the computed target value to the device.
    Write,
}

impl fmt::Display for CommandPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => f.write_str("read"),
            Self::Write => f.write_str("write"),
        }
    }
}

/// Reasons a command is rejected before reaching the network.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvalidCommand {
    /// No device with this identifier is in the current list.
    #[error("unknown device {0}")]
    UnknownDevice(String),

    /// The device kind does not support the command.
    #[error("device {identifier} of kind {kind} does not support {command}")]
    UnsupportedKind {
        /// Identifier of the target device.
        identifier: String,
        /// Kind of the target device.
        kind: DeviceKind,
        /// Human readable command name.
        command: &'static str,
    },
}

/// Errors related to value validation and constraints.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// A numeric value is outside the allowed range.
    #[error("value {actual} is out of range [{min}, {max}]")]
    OutOfRange {
        /// Minimum allowed value.
        min: i64,
        /// Maximum allowed value.
        max: i64,
        /// The actual value that was provided.
        actual: i64,
    },

    /// The device type is not one of the admitted switch/dimmer kinds.
    #[error("unsupported device type: {0}")]
    UnsupportedDeviceType(String),

    /// A discovery sweep needs a positive time budget.
    #[error("discovery timeout must be positive")]
    ZeroTimeout,
}

/// Errors related to talking to a device or the network.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// HTTP request failed.
    #[cfg(feature = "wemo")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Socket level failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The device answered with a non-success HTTP status.
    #[error("unexpected HTTP status {0}")]
    UnexpectedStatus(u16),

    /// The device answered with a SOAP fault.
    #[error("device rejected command: {0}")]
    Fault(String),

    /// The device could not be reached.
    #[error("device unreachable: {0}")]
    Unreachable(String),

    /// The response could not be understood.
    #[error("invalid response: {0}")]
    Parse(#[from] ParseError),

    /// A failure seen by a request this caller joined, kept as its message.
    #[error("{0}")]
    Joined(String),
}

/// Errors related to parsing device responses.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Expected field is missing from the response.
    #[error("missing field in response: {0}")]
    MissingField(String),

    /// Failed to parse a specific value.
    #[error("failed to parse {field}: {message}")]
    InvalidValue {
        /// The field that failed to parse.
        field: String,
        /// Description of the parsing failure.
        message: String,
    },

    /// XML document could not be decoded.
    #[cfg(feature = "wemo")]
    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::DeError),

    /// Unexpected response format.
    #[error("unexpected response format: {0}")]
    UnexpectedFormat(String),
}

/// Errors from the persistent blob store.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Underlying file system failure.
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The device list could not be serialized.
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A custom store backend reported a failure.
    #[error("storage backend failed: {0}")]
    Backend(String),
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
