#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use wr3223_bridge::error::DriverError;
use wr3223_bridge::prelude::*;
use wr3223_bridge::wr3223::connection::{Connector, RawResponse, Transport};
use wr3223_bridge::wr3223::driver::ChannelData;
use wr3223_bridge::wr3223::{Driver, Wr3223Command};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Exchange {
    Read(Wr3223Command),
    Write(Wr3223Command, String),
}

#[derive(Debug, Default)]
struct ControllerState {
    values: HashMap<Wr3223Command, String>,
    unsupported: HashSet<Wr3223Command>,
    nak: HashSet<Wr3223Command>,
    fail_on: Option<Wr3223Command>,
    garble: Option<Wr3223Command>,
    refuse_connect: bool,
    connects: usize,
    log: Vec<Exchange>,
}

/// Scripted stand-in for the controller. Registers not set explicitly read as "0".
#[derive(Clone, Debug, Default)]
pub struct FakeController {
    state: Arc<Mutex<ControllerState>>,
}

impl FakeController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, command: Wr3223Command, value: &str) {
        self.state.lock().unwrap().values.insert(command, value.to_string());
    }

    pub fn set_unsupported(&self, command: Wr3223Command, unsupported: bool) {
        let mut state = self.state.lock().unwrap();
        if unsupported {
            state.unsupported.insert(command);
        } else {
            state.unsupported.remove(&command);
        }
    }

    pub fn nak(&self, command: Wr3223Command) {
        self.state.lock().unwrap().nak.insert(command);
    }

    pub fn fail_on(&self, command: Option<Wr3223Command>) {
        self.state.lock().unwrap().fail_on = command;
    }

    /// Answer reads of `command` with a reply the codec rejects.
    pub fn garble(&self, command: Option<Wr3223Command>) {
        self.state.lock().unwrap().garble = command;
    }

    pub fn refuse_connect(&self, refuse: bool) {
        self.state.lock().unwrap().refuse_connect = refuse;
    }

    pub fn connects(&self) -> usize {
        self.state.lock().unwrap().connects
    }

    pub fn log(&self) -> Vec<Exchange> {
        self.state.lock().unwrap().log.clone()
    }

    pub fn clear_log(&self) {
        self.state.lock().unwrap().log.clear();
    }

    pub fn reads_of(&self, command: Wr3223Command) -> usize {
        self.log()
            .iter()
            .filter(|e| **e == Exchange::Read(command))
            .count()
    }

    pub fn writes(&self) -> Vec<(Wr3223Command, String)> {
        self.log()
            .into_iter()
            .filter_map(|e| match e {
                Exchange::Write(command, data) => Some((command, data)),
                Exchange::Read(_) => None,
            })
            .collect()
    }

    pub fn writes_of(&self, command: Wr3223Command) -> Vec<String> {
        self.writes()
            .into_iter()
            .filter(|(c, _)| *c == command)
            .map(|(_, data)| data)
            .collect()
    }

    pub fn connector(&self) -> Box<dyn Connector> {
        Box::new(FakeConnector {
            controller: self.clone(),
        })
    }

    pub fn transport(&self) -> FakeTransport {
        FakeTransport {
            controller: self.clone(),
        }
    }
}

struct FakeConnector {
    controller: FakeController,
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self) -> Result<Box<dyn Transport>, DriverError> {
        let mut state = self.controller.state.lock().unwrap();
        if state.refuse_connect {
            return Err(DriverError::Connection("connection refused".to_string()));
        }
        state.connects += 1;

        Ok(Box::new(self.controller.transport()))
    }

    fn describe(&self) -> String {
        "fake".to_string()
    }
}

pub struct FakeTransport {
    controller: FakeController,
}

#[async_trait]
impl Transport for FakeTransport {
    async fn read(
        &mut self,
        _address: u8,
        command: Wr3223Command,
    ) -> Result<RawResponse, DriverError> {
        let mut state = self.controller.state.lock().unwrap();
        state.log.push(Exchange::Read(command));

        if state.fail_on == Some(command) {
            return Err(DriverError::Connection("broken pipe".to_string()));
        }
        if state.garble == Some(command) {
            return Err(DriverError::Protocol("BCC mismatch".to_string()));
        }
        if state.unsupported.contains(&command) {
            return Ok(RawResponse::from_payload("???"));
        }

        let value = state.values.get(&command).cloned().unwrap_or_else(|| "0".to_string());
        Ok(RawResponse::from_payload(&value))
    }

    async fn write(
        &mut self,
        _address: u8,
        command: Wr3223Command,
        data: &str,
    ) -> Result<bool, DriverError> {
        let mut state = self.controller.state.lock().unwrap();
        state.log.push(Exchange::Write(command, data.to_string()));

        if state.fail_on == Some(command) {
            return Err(DriverError::Connection("broken pipe".to_string()));
        }
        if state.nak.contains(&command) {
            return Ok(false);
        }

        state.values.insert(command, data.to_string());
        Ok(true)
    }

    async fn close(&mut self) {}
}

pub fn driver(controller: &FakeController) -> (Driver, Channels) {
    let channels = Channels::new();
    let driver = Driver::with_connector(1, controller.connector(), channels.clone());
    (driver, channels)
}

pub fn drain(receiver: &mut broadcast::Receiver<ChannelData>) -> Vec<ChannelData> {
    let mut r = Vec::new();
    while let Ok(data) = receiver.try_recv() {
        r.push(data);
    }
    r
}

pub fn config(mqtt_enabled: bool) -> ConfigWrapper {
    let yaml = format!(
        "wr3223:\n  host: localhost\n  port: 8899\n  refresh: 1000\nmqtt:\n  enabled: {}\n  host: localhost\n",
        mqtt_enabled
    );

    ConfigWrapper::from_config(Config::from_yaml(&yaml).unwrap())
}
