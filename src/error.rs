use thiserror::Error;

use crate::wr3223::catalog::ValueKind;
use crate::wr3223::commands::Wr3223Command;

/// Errors raised by the WR3223 driver.
///
/// None of these are fatal to the process: connection and protocol errors
/// abort the current tick, everything else is scoped to a single command.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("command {0} is not supported by the controller")]
    Unsupported(Wr3223Command),

    #[error("value {value} for {name} out of range [{min}, {max}]")]
    OutOfRange {
        name: &'static str,
        value: i32,
        min: i32,
        max: i32,
    },

    #[error("{name} expects a {expected} value")]
    TypeMismatch {
        name: &'static str,
        expected: ValueKind,
    },

    #[error("unknown command {0}")]
    UnknownCommand(String),

    #[error("can't decode {payload:?} from {command}")]
    Decode {
        command: Wr3223Command,
        payload: String,
    },
}

impl DriverError {
    /// Errors after which the transport can no longer be trusted.
    pub fn is_fatal_to_connection(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Protocol(_))
    }
}

impl From<std::io::Error> for DriverError {
    fn from(err: std::io::Error) -> Self {
        Self::Connection(err.to_string())
    }
}
