use crate::prelude::*;

use crate::error::DriverError;
use crate::scheduler::{Scheduler, TickHandler};
use crate::wr3223::catalog::{self, CommandType, ValueKind, READ_REGISTERS};
use crate::wr3223::commands::Wr3223Command;
use crate::wr3223::connection::{
    ConnectionManager, Connector, RawResponse, SerialConnector, TcpConnector, Transport,
};
use crate::wr3223::decoder::{
    decode_value, DecodedError, DecodedEvuBlockade, DecodedRelay, DecodedStatus,
};
use crate::wr3223::probe::CapabilityProbe;
use crate::wr3223::queue::WriteQueue;
use crate::wr3223::value::{Value, WriteValue};

use {async_trait::async_trait, std::time::Duration, tokio::task::JoinHandle};

// operation mode the controller needs before it accepts remote writes
const REMOTE_OPERATION_MODE: i32 = 3;
const STOP_TIMEOUT_SECS: u64 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Remote,
    ManualOverride,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Remote => "remote",
            Mode::ManualOverride => "manual",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ChannelData {
    Value(CommandType, Value),
    Mode(Mode),
    Shutdown,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TickOutcome {
    #[default]
    Complete,
    ConnectFailed,
    Aborted,
}

/// What happened during one tick.
#[derive(Debug, Default)]
pub struct TickReport {
    pub outcome: TickOutcome,
    /// `None` when the relay register couldn't be read.
    pub mode: Option<Mode>,
    /// `None` when no keep-alive was attempted.
    pub keep_alive: Option<bool>,
    pub committed: Vec<CommandType>,
    pub published: usize,
    pub field_errors: Vec<DriverError>,
}

#[derive(Clone, Debug, Default)]
pub struct DriverStats {
    pub ticks: u64,
    pub ticks_completed: u64,
    pub connect_failures: u64,
    pub ticks_aborted: u64,
    pub keep_alive_failures: u64,
    pub manual_override_ticks: u64,
    pub writes_committed: u64,
    pub values_published: u64,
    pub field_errors: u64,
}

impl DriverStats {
    fn record(&mut self, report: &TickReport) {
        self.ticks += 1;
        match report.outcome {
            TickOutcome::Complete => self.ticks_completed += 1,
            TickOutcome::ConnectFailed => self.connect_failures += 1,
            TickOutcome::Aborted => self.ticks_aborted += 1,
        }
        if report.keep_alive == Some(false) {
            self.keep_alive_failures += 1;
        }
        if report.mode == Some(Mode::ManualOverride) {
            self.manual_override_ticks += 1;
        }
        self.writes_committed += report.committed.len() as u64;
        self.values_published += report.published as u64;
        self.field_errors += report.field_errors.len() as u64;
    }

    pub fn print_summary(&self) {
        info!("Driver Statistics:");
        info!("  Ticks: {}", self.ticks);
        info!("    Completed: {}", self.ticks_completed);
        info!("    Connect failures: {}", self.connect_failures);
        info!("    Aborted by I/O errors: {}", self.ticks_aborted);
        info!("    Under manual override: {}", self.manual_override_ticks);
        info!("  Writes:");
        info!("    Keep-alive failures: {}", self.keep_alive_failures);
        info!("    Committed: {}", self.writes_committed);
        info!("  Values published: {}", self.values_published);
        info!("  Field errors: {}", self.field_errors);
    }
}

/// Command receipt. Cheap to clone, never touches the transport.
#[derive(Clone, Debug)]
pub struct DriverHandle {
    queue: WriteQueue,
}

impl DriverHandle {
    pub fn submit_write(&self, name: &str, value: WriteValue) -> Result<(), DriverError> {
        let spec = catalog::lookup(name)
            .filter(|spec| spec.direction.writable())
            .ok_or_else(|| DriverError::UnknownCommand(name.to_string()))?;

        let value = match (spec.kind, value) {
            (ValueKind::Numeric, WriteValue::Number(n)) => n,
            (ValueKind::Boolean, WriteValue::Switch(on)) => on as i32,
            (expected, _) => {
                return Err(DriverError::TypeMismatch {
                    name: spec.name,
                    expected,
                })
            }
        };

        self.queue.submit(spec.command_type, value)?;
        debug!("queued {}={}", spec.name, value);
        Ok(())
    }

    pub fn queue(&self) -> &WriteQueue {
        &self.queue
    }
}

pub struct Driver {
    address: u8,
    connection: ConnectionManager,
    probe: CapabilityProbe,
    queue: WriteQueue,
    channels: Channels,
    mode: Option<Mode>,
    stats: DriverStats,
}

impl Driver {
    pub fn new(config: &config::Wr3223, channels: Channels) -> Result<Self> {
        let connector: Box<dyn Connector> = match config.target()? {
            config::Target::Tcp { host, port } => {
                Box::new(TcpConnector::new(host, port, config.read_timeout()))
            }
            config::Target::Serial { path } => {
                Box::new(SerialConnector::new(path, config.read_timeout()))
            }
        };

        Ok(Self::with_connector(
            config.controller_addr(),
            connector,
            channels,
        ))
    }

    pub fn with_connector(address: u8, connector: Box<dyn Connector>, channels: Channels) -> Self {
        let queue = WriteQueue::new();
        if let Err(e) = queue.submit(CommandType::OperationMode, REMOTE_OPERATION_MODE) {
            // catalog bounds for operation mode include 3
            error!("can't seed operation mode: {}", e);
        }

        Self {
            address,
            connection: ConnectionManager::new(connector),
            probe: CapabilityProbe::new(),
            queue,
            channels,
            mode: None,
            stats: DriverStats::default(),
        }
    }

    pub fn handle(&self) -> DriverHandle {
        DriverHandle {
            queue: self.queue.clone(),
        }
    }

    pub fn stats(&self) -> &DriverStats {
        &self.stats
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub fn probe(&self) -> &CapabilityProbe {
        &self.probe
    }

    /// Run one poll cycle. Never fails; problems are reported in the [`TickReport`].
    pub async fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();

        match self.connection.ensure_connected().await {
            Ok(true) => self.probe.reset(),
            Ok(false) => {}
            Err(e) => {
                error!("can't connect to WR3223: {}", e);
                report.outcome = TickOutcome::ConnectFailed;
                self.stats.record(&report);
                return report;
            }
        }

        if let Err(e) = self.poll(&mut report).await {
            if e.is_fatal_to_connection() {
                error!("communication error, closing connection: {}", e);
                self.connection.close().await;
            } else {
                error!("tick aborted: {}", e);
            }
            report.outcome = TickOutcome::Aborted;
        }

        if report.mode.is_some() && report.mode != self.mode {
            match report.mode {
                Some(Mode::ManualOverride) => {
                    warn!("control panel active, holding {} pending writes", self.queue.pending().len())
                }
                _ => info!("WR3223 under remote control"),
            }
            self.mode = report.mode;
        }

        for e in &report.field_errors {
            warn!("{}", e);
        }

        self.stats.record(&report);
        report
    }

    async fn poll(&mut self, report: &mut TickReport) -> Result<(), DriverError> {
        let queue = &self.queue;
        let mut tick = Tick {
            address: self.address,
            transport: self.connection.transport()?,
            probe: &mut self.probe,
            channels: &self.channels,
            report,
        };

        if let Some(raw) = tick.read_if_available(Wr3223Command::Ta).await? {
            match DecodedStatus::decode(&raw) {
                Ok(status) => tick.publish_flags(&status.flags()),
                Err(e) => tick.field_error(e),
            }
        }

        if let Some(raw) = tick.read_if_available(Wr3223Command::Tf).await? {
            match DecodedEvuBlockade::decode(&raw) {
                Ok(evu) => tick.publish_flags(&evu.flags()),
                Err(e) => tick.field_error(e),
            }
        }

        // the relay register decides whether we may write, so it bypasses the probe
        let manual_override = match tick.transport.read(tick.address, Wr3223Command::RL).await? {
            RawResponse::Value(raw) => match DecodedRelay::decode(&raw) {
                Ok(relay) => {
                    tick.publish_flags(&relay.flags());
                    Some(relay.manual_override())
                }
                Err(e) => {
                    tick.field_error(e);
                    None
                }
            },
            RawResponse::Unsupported => {
                tick.field_error(DriverError::Unsupported(Wr3223Command::RL));
                None
            }
        };

        if let Some(raw) = tick.read_if_available(Wr3223Command::ER).await? {
            match DecodedError::decode(&raw) {
                Ok(errors) => tick.publish_flags(&errors.flags()),
                Err(e) => tick.field_error(e),
            }
        }

        match manual_override {
            Some(false) => {
                let result = queue.reconcile(&mut *tick.transport, tick.address).await?;
                tick.report.keep_alive = Some(result.keep_alive_acked);
                tick.report.committed = result.committed;
                tick.set_mode(Mode::Remote);
            }
            Some(true) => tick.set_mode(Mode::ManualOverride),
            None => warn!("relay state unknown, skipping writes this tick"),
        }

        for command_type in READ_REGISTERS {
            // don't publish a stale value over one we're about to write
            if queue.is_pending(command_type) {
                continue;
            }

            let spec = command_type.spec();
            if let Some(raw) = tick.read_if_available(spec.command).await? {
                match decode_value(spec, &raw) {
                    Ok(value) => tick.publish(command_type, value),
                    Err(e) => tick.field_error(e),
                }
            }
        }

        Ok(())
    }

    /// Spawn the poll loop. The returned task owns the driver until stopped.
    pub fn start(self, refresh: Duration) -> DriverTask {
        let handle = self.handle();
        let mut scheduler = Scheduler::new(refresh);
        let shutdown = scheduler.shutdown_sender();

        let task = tokio::spawn(async move {
            let mut driver = self;
            scheduler.run(&mut driver).await;
            driver.connection.close().await;
            driver.stats
        });

        DriverTask {
            handle,
            shutdown,
            task,
        }
    }
}

#[async_trait]
impl TickHandler for Driver {
    async fn on_tick(&mut self) {
        let report = self.tick().await;
        debug!(
            "tick {:?}: {} published, {} written",
            report.outcome,
            report.published,
            report.committed.len()
        );
    }
}

/// Tick-local view: everything a single poll cycle touches.
struct Tick<'a> {
    address: u8,
    transport: &'a mut dyn Transport,
    probe: &'a mut CapabilityProbe,
    channels: &'a Channels,
    report: &'a mut TickReport,
}

impl Tick<'_> {
    async fn read_if_available(
        &mut self,
        command: Wr3223Command,
    ) -> Result<Option<String>, DriverError> {
        self.probe
            .read_if_available(&mut *self.transport, self.address, command)
            .await
    }

    fn publish(&mut self, command_type: CommandType, value: Value) {
        debug!("{} = {}", command_type, value);
        // no subscribers just means nobody is listening yet
        let _ = self
            .channels
            .from_driver
            .send(ChannelData::Value(command_type, value));
        self.report.published += 1;
    }

    fn publish_flags(&mut self, flags: &[(CommandType, bool)]) {
        for (command_type, on) in flags {
            self.publish(*command_type, Value::Switch(*on));
        }
    }

    fn set_mode(&mut self, mode: Mode) {
        let _ = self.channels.from_driver.send(ChannelData::Mode(mode));
        self.report.mode = Some(mode);
    }

    fn field_error(&mut self, error: DriverError) {
        self.report.field_errors.push(error);
    }
}

/// A running driver.
pub struct DriverTask {
    handle: DriverHandle,
    shutdown: broadcast::Sender<()>,
    task: JoinHandle<DriverStats>,
}

impl DriverTask {
    pub fn handle(&self) -> DriverHandle {
        self.handle.clone()
    }

    /// Ask the poll loop to stop after the current tick. If that takes longer
    /// than the stop timeout the task is aborted, which drops the transport.
    pub async fn stop(mut self) -> Option<DriverStats> {
        info!("Stopping WR3223 driver...");
        let _ = self.shutdown.send(());

        match tokio::time::timeout(Duration::from_secs(STOP_TIMEOUT_SECS), &mut self.task).await {
            Ok(Ok(stats)) => Some(stats),
            Ok(Err(e)) => {
                error!("driver task failed: {}", e);
                None
            }
            Err(_) => {
                warn!(
                    "driver didn't stop within {}s, aborting",
                    STOP_TIMEOUT_SECS
                );
                self.task.abort();
                None
            }
        }
    }
}
