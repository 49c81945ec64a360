// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `wemo_sync` - discovery, caching and control of Belkin WeMo switches
//! and dimmers.
//!
//! The library keeps one consistent, sorted device list fed by three sources
//! that lag behind each other: a persisted snapshot from the last run, a
//! time-bounded network discovery sweep, and the results of commands sent to
//! individual devices.
//!
//! # Supported Features
//!
//! - **Discovery**: SSDP broadcast with a fixed time budget
//! - **Caching**: last known list persisted as JSON, tolerant of bad data
//! - **Commands**: toggle power, step dimmer brightness up or down
//! - **Observation**: loading flag and a broadcast of list events
//!
//! # Supported Devices
//!
//! - Switch (`urn:Belkin:device:controllee:1`): smart plugs
//! - Light switch (`urn:Belkin:device:lightswitch:1`): in-wall switches
//! - Dimmer (`urn:Belkin:device:dimmer:1`): in-wall dimmers
//!
//! # Quick Start
//!
//! ```no_run
//! use wemo_sync::cache::FileStore;
//! use wemo_sync::protocol::WemoTransport;
//! use wemo_sync::types::Direction;
//! use wemo_sync::DeviceService;
//!
//! #[tokio::main]
//! async fn main() -> wemo_sync::Result<()> {
//!     let transport = WemoTransport::new().map_err(wemo_sync::Error::DiscoveryUnavailable)?;
//!     let service = DeviceService::new(transport, FileStore::new("./cache"));
//!
//!     // Cached devices first, then whatever answers within two seconds
//!     let report = service.load().await?;
//!     if let Some(warning) = report.cache_warning() {
//!         eprintln!("device list not saved: {warning}");
//!     }
//!
//!     for device in service.devices() {
//!         if device.kind.supports_brightness() {
//!             service.step_brightness(device.identifier(), Direction::Up).await?;
//!         } else {
//!             service.toggle(device.identifier()).await?;
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Watching the list
//!
//! ```no_run
//! use wemo_sync::event::DeviceEvent;
//! # use wemo_sync::{cache::MemoryStore, protocol::WemoTransport, DeviceService};
//!
//! # async fn example(service: DeviceService<WemoTransport, MemoryStore>) {
//! let mut events = service.subscribe();
//! while let Ok(event) = events.recv().await {
//!     match event {
//!         DeviceEvent::DevicesReplaced { devices, source } => {
//!             println!("{} devices from {source}", devices.len());
//!         }
//!         DeviceEvent::DeviceUpdated { device } => {
//!             println!("{} changed", device.friendly_name);
//!         }
//!         _ => {}
//!     }
//! }
//! # }
//! ```

pub mod cache;
pub mod command;
pub mod discovery;
pub mod error;
pub mod event;
pub mod manager;
pub mod protocol;
pub mod reconcile;
mod record;
pub mod types;

pub use command::{CommandPlan, DeviceCommand, StateValue};
pub use error::{
    CommandPhase, Error, InvalidCommand, ParseError, PersistenceError, ProtocolError, Result,
    ValueError,
};
pub use manager::{DeviceService, ServiceConfig, SweepReport};
pub use protocol::{RawDeviceInfo, Transport};
pub use record::{DeviceRecord, Endpoint};
pub use types::{BinaryState, Brightness, DeviceKind, Direction};
