// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value types with validated ranges.

mod binary_state;
mod brightness;
mod device_kind;

pub use binary_state::BinaryState;
pub use brightness::{Brightness, Direction};
pub use device_kind::DeviceKind;
