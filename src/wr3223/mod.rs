//! Driver for the WR3223 ventilation / heat pump controller.

pub mod catalog;
pub mod codec;
pub mod commands;
pub mod connection;
pub mod decoder;
pub mod driver;
pub mod keep_alive;
pub mod probe;
pub mod queue;
pub mod value;

pub use catalog::{CommandSpec, CommandType};
pub use commands::Wr3223Command;
pub use driver::{Driver, DriverHandle, DriverStats, DriverTask, Mode, TickOutcome, TickReport};
pub use value::{Value, WriteValue};
