// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Two-phase execution of a [`DeviceCommand`].

use super::{DeviceCommand, StateValue};
use crate::error::{CommandPhase, Error, ParseError, ProtocolError};
use crate::protocol::Transport;
use crate::record::{DeviceRecord, Endpoint};

/// A command whose read phase has completed.
///
/// Holding a plan means the live value has been fetched and the target
/// computed, but nothing has been written yet. Two plans for the same device
/// built concurrently would both be based on the same live value, which is
/// why the service serializes commands per device.
///
/// # Examples
///
/// ```no_run
/// use wemo_sync::command::{CommandPlan, DeviceCommand};
/// use wemo_sync::protocol::WemoTransport;
/// use wemo_sync::DeviceRecord;
///
/// # async fn example(transport: WemoTransport, lamp: DeviceRecord) -> wemo_sync::Result<()> {
/// let plan = CommandPlan::fetch(&transport, &lamp, DeviceCommand::Toggle).await?;
/// println!("{} -> {}", plan.current(), plan.target());
/// let achieved = plan.apply(&transport).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct CommandPlan {
    command: DeviceCommand,
    identifier: String,
    endpoint: Endpoint,
    current: StateValue,
    target: StateValue,
}

impl CommandPlan {
    /// Reads the live value from the device and computes the target.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCommand`] if the command does not apply to
    /// the record (no I/O happens in that case) and [`Error::DeviceCommand`]
    /// with [`CommandPhase::Read`] if the device cannot be read.
    pub async fn fetch<T: Transport>(
        transport: &T,
        record: &DeviceRecord,
        command: DeviceCommand,
    ) -> Result<Self, Error> {
        command.validate(record)?;

        let identifier = record.mac_address.clone();
        let endpoint = record.endpoint();
        let read_failed = |source| Error::DeviceCommand {
            identifier: identifier.clone(),
            phase: CommandPhase::Read,
            source,
        };

        let current = match command {
            DeviceCommand::Toggle => transport
                .binary_state(&endpoint)
                .await
                .map(StateValue::Binary),
            DeviceCommand::StepBrightness(_) => transport
                .brightness(&endpoint)
                .await
                .map(StateValue::Brightness),
        }
        .map_err(read_failed)?;

        let target = command.target(&current).ok_or_else(|| {
            read_failed(ProtocolError::Parse(ParseError::UnexpectedFormat(format!(
                "{current} cannot be used for {command}"
            ))))
        })?;

        tracing::debug!(
            mac = %identifier,
            %command,
            %current,
            %target,
            "Planned device command"
        );

        Ok(Self {
            command,
            identifier,
            endpoint,
            current,
            target,
        })
    }

    /// Returns the command being executed.
    #[must_use]
    pub fn command(&self) -> DeviceCommand {
        self.command
    }

    /// Returns the identifier of the target device.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Returns the value read from the device.
    #[must_use]
    pub fn current(&self) -> &StateValue {
        &self.current
    }

    /// Returns the value that will be written.
    #[must_use]
    pub fn target(&self) -> &StateValue {
        &self.target
    }

    /// Writes the target value to the device and returns it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceCommand`] with [`CommandPhase::Write`] if the
    /// device cannot be reached or rejects the value.
    pub async fn apply<T: Transport>(self, transport: &T) -> Result<StateValue, Error> {
        let written = match &self.target {
            StateValue::Binary(state) => transport.set_binary_state(&self.endpoint, state).await,
            StateValue::Brightness(level) => transport.set_brightness(&self.endpoint, *level).await,
        };

        written.map_err(|source| Error::DeviceCommand {
            identifier: self.identifier.clone(),
            phase: CommandPhase::Write,
            source,
        })?;

        tracing::debug!(mac = %self.identifier, target = %self.target, "Applied device command");

        Ok(self.target)
    }
}
