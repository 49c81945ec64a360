// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The device service: one owned, consistent device list.
//!
//! # Overview
//!
//! [`DeviceService`] is the component a presentation layer talks to. It
//! combines the other pieces of the crate:
//!
//! - **Cached start**: [`load`](DeviceService::load) shows the persisted list
//!   right away, then refreshes it from the network
//! - **Bounded discovery**: [`refresh`](DeviceService::refresh) runs one sweep
//!   and swaps the reconciled result in atomically; concurrent callers join
//!   the sweep already in flight
//! - **Commands**: [`toggle`](DeviceService::toggle) and
//!   [`step_brightness`](DeviceService::step_brightness) patch a single
//!   record, serialized per device
//! - **Observation**: a loading flag and a broadcast of [`DeviceEvent`]s
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use wemo_sync::cache::FileStore;
//! use wemo_sync::manager::DeviceService;
//! use wemo_sync::protocol::WemoTransport;
//!
//! #[tokio::main]
//! async fn main() -> wemo_sync::Result<()> {
//!     let transport = WemoTransport::new().map_err(wemo_sync::Error::DiscoveryUnavailable)?;
//!     let service = Arc::new(DeviceService::new(transport, FileStore::new("/var/cache/wemo")));
//!
//!     let report = service.load().await?;
//!     for device in report.devices() {
//!         println!("{} is {}", device.friendly_name, if device.is_on() { "on" } else { "off" });
//!     }
//!
//!     if let Some(lamp) = report.devices().first() {
//!         service.toggle(lamp.identifier()).await?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! [`DeviceEvent`]: crate::event::DeviceEvent

mod config;
mod device_service;

pub use config::{DEFAULT_EVENT_CAPACITY, ServiceConfig};
pub use device_service::{DeviceService, SweepReport};
