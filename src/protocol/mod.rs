// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Discovery and control protocol for WeMo devices.
//!
//! The rest of the crate only talks to devices through the [`Transport`]
//! trait. [`WemoTransport`] implements it on top of SSDP discovery and the
//! UPnP `basicevent1` SOAP service; tests plug in scripted transports.
//!
//! # Protocols
//!
//! - SSDP `M-SEARCH` over UDP multicast to find devices
//! - HTTP `GET /setup.xml` to describe each responding device
//! - SOAP `GetBinaryState` / `SetBinaryState` to read and write state

use std::future::Future;

use tokio::sync::mpsc;

use crate::error::ProtocolError;
use crate::record::Endpoint;
use crate::types::{BinaryState, Brightness};

#[cfg(feature = "wemo")]
mod soap;
#[cfg(feature = "wemo")]
mod ssdp;
#[cfg(feature = "wemo")]
mod wemo;

#[cfg(feature = "wemo")]
pub use wemo::{WemoConfig, WemoTransport};

/// Channel end a transport pushes discovery responses into.
///
/// The receiving side is closed once the sweep deadline passes; sends after
/// that fail and the response is dropped.
pub type DiscoverySink = mpsc::UnboundedSender<RawDeviceInfo>;

/// A device description as received from the network, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawDeviceInfo {
    /// UPnP device type URN.
    pub device_type: String,
    /// Hardware address.
    pub mac_address: Option<String>,
    /// Human-readable label.
    pub friendly_name: Option<String>,
    /// Reported on/off flag.
    pub binary_state: Option<String>,
    /// Reported brightness, dimmers only.
    pub brightness: Option<String>,
    /// Host the description was fetched from.
    pub host: String,
    /// Port the description was fetched from.
    pub port: u16,
}

/// Capability to discover devices and send commands to them.
///
/// Implementations must be cheap to share: the service keeps one behind an
/// `Arc` and calls it from concurrent tasks.
pub trait Transport: Send + Sync {
    /// Starts a network-wide discovery broadcast.
    ///
    /// Returns as soon as the broadcast is on its way. Responses are pushed
    /// into `sink` asynchronously, in any order, until the sink is closed.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the broadcast cannot be started.
    fn broadcast_discover(
        &self,
        sink: DiscoverySink,
    ) -> impl Future<Output = Result<(), ProtocolError>> + Send;

    /// Reads the live on/off flag of a device.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the device is unreachable or the reply is invalid.
    fn binary_state(
        &self,
        endpoint: &Endpoint,
    ) -> impl Future<Output = Result<BinaryState, ProtocolError>> + Send;

    /// Writes the on/off flag of a device.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the device is unreachable or rejects the value.
    fn set_binary_state(
        &self,
        endpoint: &Endpoint,
        state: &BinaryState,
    ) -> impl Future<Output = Result<(), ProtocolError>> + Send;

    /// Reads the live brightness of a dimmer.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the device is unreachable or reports no brightness.
    fn brightness(
        &self,
        endpoint: &Endpoint,
    ) -> impl Future<Output = Result<Brightness, ProtocolError>> + Send;

    /// Writes the brightness of a dimmer.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the device is unreachable or rejects the value.
    fn set_brightness(
        &self,
        endpoint: &Endpoint,
        brightness: Brightness,
    ) -> impl Future<Output = Result<(), ProtocolError>> + Send;
}
