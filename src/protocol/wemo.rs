// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! WeMo implementation of [`Transport`] over SSDP and UPnP SOAP.

use std::collections::HashSet;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};
use tokio::net::UdpSocket;

use super::soap::{self, BASIC_EVENT_CONTROL, BASIC_EVENT_SERVICE, SetupDocument};
use super::{DiscoverySink, RawDeviceInfo, Transport, ssdp};
use crate::error::{ParseError, ProtocolError};
use crate::record::Endpoint;
use crate::types::{BinaryState, Brightness};

// ============================================================================
// WemoConfig
// ============================================================================

/// Configuration for the WeMo transport.
///
/// # Examples
///
/// ```
/// use wemo_sync::protocol::WemoConfig;
/// use std::time::Duration;
///
/// let config = WemoConfig::new()
///     .with_request_timeout(Duration::from_secs(3))
///     .with_mx(1);
/// assert_eq!(config.request_timeout(), Duration::from_secs(3));
/// ```
#[derive(Debug, Clone)]
pub struct WemoConfig {
    search_target: String,
    multicast_addr: SocketAddr,
    request_timeout: Duration,
    mx: u8,
}

impl WemoConfig {
    /// SSDP search target answered by every WeMo switch and dimmer.
    pub const DEFAULT_SEARCH_TARGET: &'static str = BASIC_EVENT_SERVICE;
    /// SSDP multicast group.
    pub const DEFAULT_MULTICAST_ADDR: SocketAddr =
        SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(239, 255, 255, 250), 1900));
    /// Default per-request HTTP timeout.
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
    /// Default SSDP `MX` (maximum response delay in seconds).
    pub const DEFAULT_MX: u8 = 2;

    /// Creates a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the SSDP search target.
    #[must_use]
    pub fn with_search_target(mut self, target: impl Into<String>) -> Self {
        self.search_target = target.into();
        self
    }

    /// Sets the address the search request is sent to.
    #[must_use]
    pub fn with_multicast_addr(mut self, addr: SocketAddr) -> Self {
        self.multicast_addr = addr;
        self
    }

    /// Sets the timeout for each HTTP request to a device.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the SSDP `MX` value.
    #[must_use]
    pub fn with_mx(mut self, mx: u8) -> Self {
        self.mx = mx;
        self
    }

    /// Returns the SSDP search target.
    #[must_use]
    pub fn search_target(&self) -> &str {
        &self.search_target
    }

    /// Returns the multicast address.
    #[must_use]
    pub fn multicast_addr(&self) -> SocketAddr {
        self.multicast_addr
    }

    /// Returns the HTTP request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Returns the SSDP `MX` value.
    #[must_use]
    pub fn mx(&self) -> u8 {
        self.mx
    }

    /// Creates a [`WemoTransport`] from this configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    pub fn into_transport(self) -> Result<WemoTransport, ProtocolError> {
        let client = Client::builder().timeout(self.request_timeout).build()?;
        Ok(WemoTransport {
            config: self,
            client,
        })
    }
}

impl Default for WemoConfig {
    fn default() -> Self {
        Self {
            search_target: Self::DEFAULT_SEARCH_TARGET.to_string(),
            multicast_addr: Self::DEFAULT_MULTICAST_ADDR,
            request_timeout: Self::DEFAULT_REQUEST_TIMEOUT,
            mx: Self::DEFAULT_MX,
        }
    }
}

// ============================================================================
// WemoTransport
// ============================================================================

/// Talks to WeMo devices on the local network.
///
/// # Examples
///
/// ```no_run
/// use wemo_sync::protocol::{Transport, WemoTransport};
/// use wemo_sync::Endpoint;
///
/// # async fn example() -> Result<(), wemo_sync::error::ProtocolError> {
/// let transport = WemoTransport::new()?;
/// let state = transport.binary_state(&Endpoint::new("192.168.1.20", 49153)).await?;
/// println!("{state}");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct WemoTransport {
    config: WemoConfig,
    client: Client,
}

impl WemoTransport {
    /// Creates a transport with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    pub fn new() -> Result<Self, ProtocolError> {
        WemoConfig::default().into_transport()
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &WemoConfig {
        &self.config
    }

    /// Fetches and decodes the device description at `location`
    /// (the `LOCATION` of an SSDP response, usually `http://host:port/setup.xml`).
    ///
    /// # Errors
    ///
    /// Returns error if the description cannot be fetched or decoded.
    pub async fn describe(&self, location: &str) -> Result<RawDeviceInfo, ProtocolError> {
        describe_with(&self.client, location).await
    }

    /// Calls a `basicevent1` action and returns the response body.
    async fn call(
        &self,
        endpoint: &Endpoint,
        action: &str,
        args: &[(&str, String)],
    ) -> Result<String, ProtocolError> {
        let url = format!("{}{BASIC_EVENT_CONTROL}", endpoint.base_url());

        tracing::debug!(%endpoint, action, "Sending SOAP request");

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "text/xml; charset=\"utf-8\"")
            .header("SOAPACTION", soap::soap_action(BASIC_EVENT_SERVICE, action))
            .body(soap::envelope(BASIC_EVENT_SERVICE, action, args))
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    ProtocolError::Unreachable(endpoint.to_string())
                } else {
                    ProtocolError::Http(e)
                }
            })?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            if let Some(fault) = soap::element_text(&body, "faultstring").ok().flatten() {
                return Err(ProtocolError::Fault(fault));
            }
            return Err(ProtocolError::UnexpectedStatus(status.as_u16()));
        }

        tracing::debug!(%endpoint, action, body = %body, "Received SOAP response");

        Ok(body)
    }

    /// Reads the `GetBinaryState` response.
    async fn get_binary_state(&self, endpoint: &Endpoint) -> Result<String, ProtocolError> {
        self.call(endpoint, "GetBinaryState", &[]).await
    }
}

/// Fetches and decodes a device description with `client`.
async fn describe_with(client: &Client, location: &str) -> Result<RawDeviceInfo, ProtocolError> {
    let url = Url::parse(location).map_err(|e| ParseError::InvalidValue {
        field: "LOCATION".to_string(),
        message: e.to_string(),
    })?;
    let host = url
        .host_str()
        .ok_or_else(|| ParseError::MissingField("LOCATION host".to_string()))?
        .to_string();
    let port = url.port_or_known_default().unwrap_or(80);

    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        return Err(ProtocolError::UnexpectedStatus(response.status().as_u16()));
    }
    let body = response.text().await?;
    let device = SetupDocument::parse(&body)?.device;

    Ok(RawDeviceInfo {
        device_type: device.device_type,
        mac_address: device.mac_address,
        friendly_name: device.friendly_name,
        binary_state: device.binary_state,
        brightness: device.brightness,
        host,
        port,
    })
}

/// Rejects a `SetBinaryState` reply that reports `Error` instead of a state.
fn check_set_response(body: &str) -> Result<(), ProtocolError> {
    match soap::element_text(body, "BinaryState")? {
        Some(state) if state.eq_ignore_ascii_case("error") => {
            Err(ProtocolError::Fault("device reported BinaryState Error".to_string()))
        }
        _ => Ok(()),
    }
}

impl Transport for WemoTransport {
    async fn broadcast_discover(&self, sink: DiscoverySink) -> Result<(), ProtocolError> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
        let request = ssdp::search_request(
            self.config.multicast_addr,
            &self.config.search_target,
            self.config.mx,
        );
        socket
            .send_to(request.as_bytes(), self.config.multicast_addr)
            .await?;

        tracing::debug!(addr = %self.config.multicast_addr, "Sent SSDP search");

        let client = self.client.clone();
        tokio::spawn(async move {
            let mut buffer = [0u8; 2048];
            let mut locations = HashSet::new();

            loop {
                tokio::select! {
                    () = sink.closed() => break,
                    received = socket.recv_from(&mut buffer) => {
                        let (size, from) = match received {
                            Ok(received) => received,
                            Err(e) => {
                                tracing::warn!(error = %e, "SSDP receive failed, ending discovery");
                                break;
                            }
                        };

                        let Some(location) = ssdp::location(&buffer[..size]) else {
                            tracing::trace!(%from, "Ignoring SSDP datagram");
                            continue;
                        };
                        // Devices answer a search several times
                        if !locations.insert(location.clone()) {
                            continue;
                        }

                        let client = client.clone();
                        let sink = sink.clone();
                        tokio::spawn(async move {
                            match describe_with(&client, &location).await {
                                Ok(info) => {
                                    if sink.send(info).is_err() {
                                        tracing::debug!(%location, "Discovery closed, dropping late response");
                                    }
                                }
                                Err(e) => {
                                    tracing::debug!(%location, error = %e, "Failed to describe device");
                                }
                            }
                        });
                    }
                }
            }

            tracing::debug!("SSDP listener stopped");
        });

        Ok(())
    }

    async fn binary_state(&self, endpoint: &Endpoint) -> Result<BinaryState, ProtocolError> {
        let body = self.get_binary_state(endpoint).await?;
        let raw = soap::element_text(&body, "BinaryState")?
            .ok_or_else(|| ParseError::MissingField("BinaryState".to_string()))?;

        // Insight firmware appends `|`-separated readings to the flag
        let flag = raw.split('|').next().unwrap_or_default();
        Ok(BinaryState::from(flag.to_string()))
    }

    async fn set_binary_state(
        &self,
        endpoint: &Endpoint,
        state: &BinaryState,
    ) -> Result<(), ProtocolError> {
        let body = self
            .call(
                endpoint,
                "SetBinaryState",
                &[("BinaryState", state.as_str().to_string())],
            )
            .await?;
        check_set_response(&body)
    }

    async fn brightness(&self, endpoint: &Endpoint) -> Result<Brightness, ProtocolError> {
        let body = self.get_binary_state(endpoint).await?;
        let raw = soap::element_text(&body, "brightness")?
            .filter(|raw| !raw.is_empty())
            .ok_or_else(|| ParseError::MissingField("brightness".to_string()))?;

        let value: i64 = raw.trim().parse().map_err(|_| ParseError::InvalidValue {
            field: "brightness".to_string(),
            message: format!("not a number: {raw}"),
        })?;
        Ok(Brightness::clamped(value))
    }

    async fn set_brightness(
        &self,
        endpoint: &Endpoint,
        brightness: Brightness,
    ) -> Result<(), ProtocolError> {
        // A dimmer at zero brightness is switched off
        let state = BinaryState::from(brightness.value() > 0);
        let body = self
            .call(
                endpoint,
                "SetBinaryState",
                &[
                    ("BinaryState", state.as_str().to_string()),
                    ("brightness", brightness.value().to_string()),
                ],
            )
            .await?;
        check_set_response(&body)
    }
}
