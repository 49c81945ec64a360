// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! SSDP search request and response handling.

use std::net::SocketAddr;

/// Builds an `M-SEARCH` request for `search_target`.
pub(crate) fn search_request(multicast: SocketAddr, search_target: &str, mx: u8) -> String {
    format!(
        "M-SEARCH * HTTP/1.1\r\n\
         HOST: {multicast}\r\n\
         MAN: \"ssdp:discover\"\r\n\
         MX: {mx}\r\n\
         ST: {search_target}\r\n\
         \r\n"
    )
}

/// Extracts the `LOCATION` header from an SSDP response datagram.
///
/// Returns `None` for anything that is not an HTTP 200 response carrying a
/// location (notifications, other searches on the segment, garbage).
pub(crate) fn location(datagram: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(datagram).ok()?;
    let mut lines = text.split("\r\n");

    let status = lines.next()?;
    if !status.starts_with("HTTP/1.1 200") {
        return None;
    }

    lines.find_map(|line| {
        let (name, value) = line.split_once(':')?;
        name.trim()
            .eq_ignore_ascii_case("location")
            .then(|| value.trim().to_string())
            .filter(|v| !v.is_empty())
    })
}
