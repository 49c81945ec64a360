// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bounded-duration device discovery.
//!
//! The discovery protocol has no notion of "done": devices answer a broadcast
//! whenever they get to it, in any order, possibly more than once. A sweep
//! therefore runs against a deadline. Everything that arrives before the
//! deadline is collected; the channel is closed at the deadline and anything
//! later is dropped by the transport.
//!
//! # Examples
//!
//! ## Discovery with an existing transport
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use wemo_sync::discovery::Discovery;
//! use wemo_sync::protocol::WemoTransport;
//!
//! # async fn example() -> wemo_sync::Result<()> {
//! let transport = Arc::new(WemoTransport::new().map_err(wemo_sync::Error::DiscoveryUnavailable)?);
//! let discovery = Discovery::new(transport);
//!
//! let devices = discovery.discover(Duration::from_secs(2)).await?;
//! println!("Found {} devices", devices.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Standalone discovery (convenience)
//!
//! ```no_run
//! use wemo_sync::discovery::{discover_devices, DiscoveryOptions};
//! use std::time::Duration;
//!
//! # async fn example() -> wemo_sync::Result<()> {
//! let options = DiscoveryOptions::new().with_timeout(Duration::from_secs(5));
//! for device in discover_devices(Some(options)).await? {
//!     println!("{} ({})", device.friendly_name, device.mac_address);
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::error::{Error, ParseError, ValueError};
use crate::protocol::{RawDeviceInfo, Transport};
use crate::record::DeviceRecord;
use crate::types::{BinaryState, Brightness, DeviceKind};

/// Default discovery timeout.
pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(2);

/// Options for a discovery sweep.
///
/// # Examples
///
/// ```
/// use wemo_sync::discovery::DiscoveryOptions;
/// use std::time::Duration;
///
/// let options = DiscoveryOptions::new().with_timeout(Duration::from_secs(10));
/// assert_eq!(options.timeout(), Duration::from_secs(10));
/// ```
#[derive(Debug, Clone, Default)]
pub struct DiscoveryOptions {
    /// How long to listen for device responses.
    timeout: Option<Duration>,
}

impl DiscoveryOptions {
    /// Creates options with default settings.
    ///
    /// Default timeout is 2 seconds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the discovery timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Returns the discovery timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout.unwrap_or(DEFAULT_DISCOVERY_TIMEOUT)
    }
}

/// Runs discovery sweeps against a [`Transport`].
#[derive(Debug)]
pub struct Discovery<T> {
    transport: Arc<T>,
}

impl<T> Clone for Discovery<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<T: Transport> Discovery<T> {
    /// Creates a coordinator using `transport`.
    #[must_use]
    pub fn new(transport: Arc<T>) -> Self {
        Self { transport }
    }

    /// Runs one sweep and returns every admitted device seen before the deadline.
    ///
    /// The returned list is in arrival order and may contain the same device
    /// more than once; pass it through [`reconcile`](crate::reconcile::reconcile)
    /// before exposing it.
    ///
    /// The sweep ends early if the transport drops every handle to the
    /// response channel, since nothing more can arrive.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Value`] for a zero timeout and
    /// [`Error::DiscoveryUnavailable`] if the broadcast cannot be started.
    pub async fn discover(&self, timeout: Duration) -> Result<Vec<DeviceRecord>, Error> {
        if timeout.is_zero() {
            return Err(ValueError::ZeroTimeout.into());
        }

        let deadline = Instant::now() + timeout;
        let (sink, mut responses) = mpsc::unbounded_channel();

        tracing::info!(
            timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            "Starting device discovery"
        );

        self.transport
            .broadcast_discover(sink)
            .await
            .map_err(Error::DiscoveryUnavailable)?;

        let mut accumulator = Vec::new();
        loop {
            match tokio::time::timeout_at(deadline, responses.recv()).await {
                Ok(Some(raw)) => match admit(raw) {
                    Ok(Some(record)) => {
                        tracing::debug!(
                            mac = %record.mac_address,
                            name = %record.friendly_name,
                            kind = %record.kind,
                            "Discovered device"
                        );
                        accumulator.push(record);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(error = %e, "Skipping malformed discovery response");
                    }
                },
                Ok(None) => {
                    tracing::debug!("Discovery transport finished before deadline");
                    break;
                }
                Err(_elapsed) => break,
            }
        }

        // Late responses fail to send from here on
        responses.close();

        tracing::info!(discovered = accumulator.len(), "Device discovery completed");

        Ok(accumulator)
    }
}

/// Validates a raw response.
///
/// Returns `Ok(None)` for device types outside the admitted kinds and an
/// error for responses that are missing what a record needs.
pub(crate) fn admit(raw: RawDeviceInfo) -> Result<Option<DeviceRecord>, ParseError> {
    let Ok(kind) = raw.device_type.parse::<DeviceKind>() else {
        tracing::trace!(device_type = %raw.device_type, "Ignoring unsupported device type");
        return Ok(None);
    };

    let mac_address = required(raw.mac_address, "macAddress")?;
    let friendly_name = required(raw.friendly_name, "friendlyName")?;
    let host = required(Some(raw.host), "host")?;
    if raw.port == 0 {
        return Err(ParseError::InvalidValue {
            field: "port".to_string(),
            message: "port 0".to_string(),
        });
    }

    let mut record = DeviceRecord::new(mac_address, friendly_name, kind, host, raw.port);
    record.binary_state = raw
        .binary_state
        .filter(|s| !s.trim().is_empty())
        .map(BinaryState::from);

    if kind.supports_brightness() {
        if let Some(raw_brightness) = raw.brightness.filter(|s| !s.trim().is_empty()) {
            let value: i64 = raw_brightness
                .trim()
                .parse()
                .map_err(|_| ParseError::InvalidValue {
                    field: "brightness".to_string(),
                    message: format!("not a number: {raw_brightness}"),
                })?;
            record.brightness = Some(Brightness::clamped(value));
        }
    }

    Ok(Some(record))
}

fn required(value: Option<String>, field: &str) -> Result<String, ParseError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ParseError::MissingField(field.to_string()))
}

/// Discovers WeMo devices on the local network.
///
/// Convenience wrapper that creates a [`WemoTransport`](crate::protocol::WemoTransport),
/// runs one sweep and returns the reconciled (deduplicated, sorted) list.
///
/// # Errors
///
/// Returns [`Error::DiscoveryUnavailable`] if the network cannot be used.
#[cfg(feature = "wemo")]
pub async fn discover_devices(options: Option<DiscoveryOptions>) -> Result<Vec<DeviceRecord>, Error> {
    let options = options.unwrap_or_default();
    let transport =
        crate::protocol::WemoTransport::new().map_err(Error::DiscoveryUnavailable)?;

    let discovered = Discovery::new(Arc::new(transport))
        .discover(options.timeout())
        .await?;

    Ok(crate::reconcile::reconcile(&[], discovered))
}
