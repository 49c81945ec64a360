// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Minimal SOAP envelope encoding and response field extraction.

use std::fmt::Write;

use quick_xml::Reader;
use quick_xml::events::Event;
use serde::Deserialize;

use crate::error::ParseError;

/// The `basicevent1` service every WeMo switch exposes.
pub(crate) const BASIC_EVENT_SERVICE: &str = "urn:Belkin:service:basicevent:1";

/// Control URL of the `basicevent1` service.
pub(crate) const BASIC_EVENT_CONTROL: &str = "/upnp/control/basicevent1";

/// Builds a SOAP request envelope for `action` with the given arguments.
pub(crate) fn envelope(service: &str, action: &str, args: &[(&str, String)]) -> String {
    let mut body = String::new();
    for (name, value) in args {
        // Arguments are numeric flags, nothing to escape.
        let _ = write!(body, "<{name}>{value}</{name}>");
    }

    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
         <s:Envelope xmlns:s=\"http://schemas.xmlsoap.org/soap/envelope/\" \
         s:encodingStyle=\"http://schemas.xmlsoap.org/soap/encoding/\">\
         <s:Body><u:{action} xmlns:u=\"{service}\">{body}</u:{action}></s:Body>\
         </s:Envelope>"
    )
}

/// Value of the `SOAPACTION` header for `action`.
pub(crate) fn soap_action(service: &str, action: &str) -> String {
    format!("\"{service}#{action}\"")
}

/// Returns the text of the first element whose local name is `name`.
///
/// Namespace prefixes are ignored, so `<u:BinaryState>` and `<BinaryState>`
/// both match `BinaryState`. An empty element yields an empty string.
pub(crate) fn element_text(xml: &str, name: &str) -> Result<Option<String>, ParseError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut inside = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                inside = start.local_name().as_ref() == name.as_bytes();
            }
            Ok(Event::Empty(empty)) if empty.local_name().as_ref() == name.as_bytes() => {
                return Ok(Some(String::new()));
            }
            Ok(Event::Text(text)) if inside => {
                let value = text
                    .unescape()
                    .map_err(|e| ParseError::UnexpectedFormat(e.to_string()))?;
                return Ok(Some(value.into_owned()));
            }
            Ok(Event::End(_)) if inside => return Ok(Some(String::new())),
            Ok(Event::Eof) => return Ok(None),
            Err(e) => return Err(ParseError::UnexpectedFormat(e.to_string())),
            _ => {}
        }
    }
}

/// The parts of `setup.xml` this crate cares about.
#[derive(Debug, Deserialize)]
pub(crate) struct SetupDocument {
    pub device: SetupDevice,
}

/// The `<device>` element of `setup.xml`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SetupDevice {
    pub device_type: String,
    pub friendly_name: Option<String>,
    pub mac_address: Option<String>,
    pub binary_state: Option<String>,
    pub brightness: Option<String>,
}

impl SetupDocument {
    /// Decodes a `setup.xml` document.
    pub(crate) fn parse(xml: &str) -> Result<Self, ParseError> {
        Ok(quick_xml::de::from_str(xml)?)
    }
}
