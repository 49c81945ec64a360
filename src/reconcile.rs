// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reconciliation of the previous device list with a fresh discovery sweep.
//!
//! Discovery is authoritative: the reconciled list is exactly the discovered
//! set. Nothing is carried over from the previous list, so a device whose
//! brightness or state changed behind our back never gets its stale value
//! revived.

use std::collections::{HashMap, HashSet};

use crate::record::DeviceRecord;

/// Builds the list that replaces `previous` once a sweep has completed.
///
/// The output is `discovered` deduplicated by identifier (the last
/// occurrence wins) and sorted by friendly name. `previous` only feeds the
/// diagnostics; the function is pure and idempotent.
///
/// # Examples
///
/// ```
/// use wemo_sync::DeviceRecord;
/// use wemo_sync::reconcile::reconcile;
/// use wemo_sync::types::DeviceKind;
///
/// let lamp = DeviceRecord::new("A", "Lamp", DeviceKind::Switch, "10.0.0.1", 49153);
/// let fan = DeviceRecord::new("B", "Fan", DeviceKind::Dimmer, "10.0.0.2", 49153);
///
/// let list = reconcile(&[lamp.clone()], vec![lamp.clone(), fan.clone()]);
/// assert_eq!(list, vec![fan, lamp]);
/// ```
#[must_use]
pub fn reconcile(previous: &[DeviceRecord], discovered: Vec<DeviceRecord>) -> Vec<DeviceRecord> {
    let devices = normalize(discovered);

    if tracing::enabled!(tracing::Level::DEBUG) {
        let before: HashSet<&str> = previous.iter().map(DeviceRecord::identifier).collect();
        let after: HashSet<&str> = devices.iter().map(DeviceRecord::identifier).collect();
        tracing::debug!(
            appeared = after.difference(&before).count(),
            vanished = before.difference(&after).count(),
            total = devices.len(),
            "Reconciled device list"
        );
    }

    devices
}

/// Deduplicates `records` by identifier, keeping the last occurrence, and
/// sorts them by friendly name. Brightness is dropped from every kind but
/// the dimmer.
///
/// Records with equal names are ordered by identifier so the result does not
/// depend on the order responses arrived in.
#[must_use]
pub fn normalize(records: Vec<DeviceRecord>) -> Vec<DeviceRecord> {
    let last_seen: HashMap<String, usize> = records
        .iter()
        .enumerate()
        .map(|(index, record)| (record.mac_address.clone(), index))
        .collect();

    let mut devices: Vec<DeviceRecord> = records
        .into_iter()
        .enumerate()
        .filter(|(index, record)| last_seen.get(&record.mac_address) == Some(index))
        .map(|(_, mut record)| {
            if !record.kind.supports_brightness() {
                record.brightness = None;
            }
            record
        })
        .collect();

    devices.sort_by(|a, b| {
        a.friendly_name
            .cmp(&b.friendly_name)
            .then_with(|| a.mac_address.cmp(&b.mac_address))
    });
    devices
}
