// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Event system for device list changes.
//!
//! The [`DeviceService`](crate::DeviceService) publishes a [`DeviceEvent`]
//! whenever the list it exposes changes, so a presentation layer can redraw
//! without polling. The [`EventBus`] uses tokio's broadcast channel to allow
//! multiple subscribers to receive events.
//!
//! # Examples
//!
//! ```
//! use wemo_sync::event::{DeviceEvent, EventBus};
//!
//! let bus = EventBus::new();
//!
//! // Subscribe to events
//! let mut rx = bus.subscribe();
//!
//! // Publish an event
//! bus.publish(DeviceEvent::LoadingChanged { loading: true });
//! ```

mod device_event;
mod event_bus;

pub use device_event::{DeviceEvent, ListSource};
pub use event_bus::EventBus;
