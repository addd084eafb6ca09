use crate::prelude::*;

use crate::error::DriverError;
use crate::wr3223::catalog::{CommandType, WRITE_REGISTERS};
use crate::wr3223::commands::Wr3223Command;
use crate::wr3223::connection::Transport;
use crate::wr3223::keep_alive::KeepAliveState;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct QueueState {
    pending: HashMap<CommandType, i32>,
    keep_alive: KeepAliveState,
}

/// Outcome of one reconciliation pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Reconciliation {
    pub keep_alive_acked: bool,
    pub committed: Vec<CommandType>,
    pub rejected: Vec<CommandType>,
}

/// Pending writes plus the keep-alive state, shared between command receipt
/// and the driver task. The lock is never held across an await.
#[derive(Clone, Debug, Default)]
pub struct WriteQueue {
    state: Arc<Mutex<QueueState>>,
}

impl WriteQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        // a poisoned lock still holds a consistent map
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue `value` for `command_type`, replacing whatever was pending for it.
    /// Switches are submitted as 0/1. Nothing is changed on error.
    pub fn submit(&self, command_type: CommandType, value: i32) -> Result<(), DriverError> {
        let spec = command_type.spec();
        if !(command_type.is_keep_alive() || WRITE_REGISTERS.contains(&command_type)) {
            return Err(DriverError::UnknownCommand(spec.name.to_string()));
        }
        spec.bounds_check(value)?;

        let mut state = self.lock();
        let on = value != 0;
        match command_type {
            // bounds checked above, 0..=3
            CommandType::VentilationLevel => {
                state.keep_alive.set_ventilation_level(value as u8)
            }
            CommandType::HeatPumpActivate => state.keep_alive.set_heat_pump_on(on),
            CommandType::AdditionalHeaterActivate => state.keep_alive.set_additional_heating_on(on),
            CommandType::CoolingModeActivate => state.keep_alive.set_cooling_on(on),
            _ => {
                if let Some(previous) = state.pending.insert(command_type, value) {
                    debug!("{} replaces pending {} for {}", value, previous, command_type);
                }
            }
        }

        Ok(())
    }

    pub fn pending(&self) -> HashMap<CommandType, i32> {
        self.lock().pending.clone()
    }

    pub fn is_pending(&self, command_type: CommandType) -> bool {
        self.lock().pending.contains_key(&command_type)
    }

    pub fn keep_alive(&self) -> KeepAliveState {
        self.lock().keep_alive
    }

    /// Send the keep-alive, then every pending write if the controller
    /// accepted it. Acked writes leave the queue unless they were replaced
    /// while in flight. Transport errors propagate and leave the queue as is.
    pub async fn reconcile(
        &self,
        transport: &mut dyn Transport,
        address: u8,
    ) -> Result<Reconciliation, DriverError> {
        let mut result = Reconciliation::default();

        let status = self.keep_alive().encode();
        if !transport.write(address, Wr3223Command::SW, &status).await? {
            error!("keep-alive write SW={} rejected, skipping pending writes", status);
            return Ok(result);
        }
        result.keep_alive_acked = true;
        debug!("keep-alive SW={} acked", status);

        let snapshot = self.pending();
        for (command_type, value) in snapshot {
            let command = command_type.spec().command;
            if transport.write(address, command, &value.to_string()).await? {
                let mut state = self.lock();
                if state.pending.get(&command_type) == Some(&value) {
                    state.pending.remove(&command_type);
                }
                info!("wrote {}={} ({})", command_type, value, command);
                result.committed.push(command_type);
            } else {
                warn!("controller rejected {}={} ({}), will retry", command_type, value, command);
                result.rejected.push(command_type);
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_write_wins() {
        let queue = WriteQueue::new();
        queue.submit(CommandType::OperationMode, 1).unwrap();
        queue.submit(CommandType::OperationMode, 3).unwrap();

        assert_eq!(queue.pending().get(&CommandType::OperationMode), Some(&3));
        assert_eq!(queue.pending().len(), 1);
    }

    #[test]
    fn keep_alive_fields_are_not_pending() {
        let queue = WriteQueue::new();
        queue.submit(CommandType::VentilationLevel, 3).unwrap();
        queue.submit(CommandType::CoolingModeActivate, 1).unwrap();

        assert!(queue.pending().is_empty());
        assert_eq!(queue.keep_alive().ventilation_level, 3);
        assert!(queue.keep_alive().cooling_on);
    }

    #[test]
    fn out_of_range_leaves_queue_alone() {
        let queue = WriteQueue::new();
        let err = queue.submit(CommandType::VentilationLevel, 5).unwrap_err();

        assert!(matches!(err, DriverError::OutOfRange { value: 5, .. }));
        assert_eq!(queue.keep_alive(), KeepAliveState::default());
    }

    #[test]
    fn every_write_register_is_accepted() {
        let queue = WriteQueue::new();
        for command_type in WRITE_REGISTERS {
            let value = command_type.spec().bounds.map_or(1, |(min, _)| min);
            queue.submit(command_type, value).unwrap();
        }

        assert_eq!(queue.pending().len(), WRITE_REGISTERS.len());
    }

    #[test]
    fn read_only_rejected() {
        let queue = WriteQueue::new();
        assert!(matches!(
            queue.submit(CommandType::TemperatureOutside, 1),
            Err(DriverError::UnknownCommand(_))
        ));
    }
}
