use crate::prelude::*;

use crate::error::DriverError;
use crate::wr3223::commands::Wr3223Command;
use crate::wr3223::connection::{RawResponse, Transport};

use std::collections::HashSet;

/// Tracks which commands the attached firmware answers with the
/// "unsupported" sentinel. A disabled command never goes on the wire again
/// until [`reset`](Self::reset) is called after a reconnect.
#[derive(Debug, Default)]
pub struct CapabilityProbe {
    disabled: HashSet<Wr3223Command>,
}

impl CapabilityProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `command` unless it is disabled. The read doubles as the probe,
    /// so a supported command costs exactly one exchange.
    pub async fn read_if_available(
        &mut self,
        transport: &mut dyn Transport,
        address: u8,
        command: Wr3223Command,
    ) -> Result<Option<String>, DriverError> {
        if self.disabled.contains(&command) {
            return Ok(None);
        }

        match transport.read(address, command).await? {
            RawResponse::Value(payload) => Ok(Some(payload)),
            RawResponse::Unsupported => {
                warn!(
                    "{}, disabling it until reconnect",
                    DriverError::Unsupported(command)
                );
                self.disabled.insert(command);
                Ok(None)
            }
        }
    }

    pub async fn is_available(
        &mut self,
        transport: &mut dyn Transport,
        address: u8,
        command: Wr3223Command,
    ) -> Result<bool, DriverError> {
        Ok(self
            .read_if_available(transport, address, command)
            .await?
            .is_some())
    }

    pub fn is_disabled(&self, command: Wr3223Command) -> bool {
        self.disabled.contains(&command)
    }

    pub fn disabled_count(&self) -> usize {
        self.disabled.len()
    }

    pub fn reset(&mut self) {
        if !self.disabled.is_empty() {
            debug!("re-enabling {} disabled commands", self.disabled.len());
        }
        self.disabled.clear();
    }
}
