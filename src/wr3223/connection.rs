use crate::prelude::*;

use crate::error::DriverError;
use crate::wr3223::codec::{Reply, Request, Wr3223Codec};
use crate::wr3223::commands::Wr3223Command;

use {
    async_trait::async_trait,
    futures::{SinkExt, StreamExt},
    net2::TcpStreamExt,
    std::time::Duration,
    tokio::io::{AsyncRead, AsyncWrite},
    tokio_serial::SerialPortBuilderExt,
    tokio_util::codec::Framed,
};

const CONNECT_TIMEOUT_SECS: u64 = 10;
const TCP_KEEPALIVE_SECS: u64 = 60;
const SERIAL_BAUD_RATE: u32 = 9600;

/// Payload the controller sends for commands its firmware doesn't implement.
pub const UNSUPPORTED_SENTINEL: &str = "???";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RawResponse {
    Value(String),
    Unsupported,
}

impl RawResponse {
    pub fn from_payload(payload: &str) -> Self {
        if payload.contains(UNSUPPORTED_SENTINEL) {
            Self::Unsupported
        } else {
            Self::Value(payload.to_string())
        }
    }
}

/// One open link to the controller. Every call is a single request/reply exchange.
#[async_trait]
pub trait Transport: Send {
    async fn read(
        &mut self,
        address: u8,
        command: Wr3223Command,
    ) -> Result<RawResponse, DriverError>;

    /// Returns whether the controller acknowledged the write.
    async fn write(
        &mut self,
        address: u8,
        command: Wr3223Command,
        data: &str,
    ) -> Result<bool, DriverError>;

    async fn close(&mut self);
}

/// Opens transports. The connection manager calls this lazily from the tick.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn Transport>, DriverError>;

    fn describe(&self) -> String;
}

pub struct FramedTransport<S> {
    framed: Framed<S, Wr3223Codec>,
    io_timeout: Duration,
}

impl<S> FramedTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S, io_timeout: Duration) -> Self {
        Self {
            framed: Framed::new(stream, Wr3223Codec::new()),
            io_timeout,
        }
    }

    async fn exchange(&mut self, request: Request) -> Result<Reply, DriverError> {
        // whatever is still buffered belongs to an earlier, abandoned exchange
        self.framed.read_buffer_mut().clear();

        let framed = &mut self.framed;
        let exchange = async move {
            framed.send(request).await?;
            match framed.next().await {
                Some(reply) => reply,
                None => Err(DriverError::Connection(
                    "connection closed by controller".to_string(),
                )),
            }
        };

        match tokio::time::timeout(self.io_timeout, exchange).await {
            Ok(reply) => reply,
            Err(_) => Err(DriverError::Connection(format!(
                "no reply within {}ms",
                self.io_timeout.as_millis()
            ))),
        }
    }
}

#[async_trait]
impl<S> Transport for FramedTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn read(
        &mut self,
        address: u8,
        command: Wr3223Command,
    ) -> Result<RawResponse, DriverError> {
        match self.exchange(Request::Read { address, command }).await? {
            Reply::Data {
                command: echo,
                payload,
            } => {
                if echo != command.bytes() {
                    return Err(DriverError::Protocol(format!(
                        "asked for {} but got reply for {}",
                        command,
                        String::from_utf8_lossy(&echo)
                    )));
                }
                debug!("RX {} = {:?}", command, payload);
                Ok(RawResponse::from_payload(&payload))
            }
            Reply::Eot => Ok(RawResponse::Unsupported),
            other => Err(DriverError::Protocol(format!(
                "unexpected {:?} in reply to read of {}",
                other, command
            ))),
        }
    }

    async fn write(
        &mut self,
        address: u8,
        command: Wr3223Command,
        data: &str,
    ) -> Result<bool, DriverError> {
        let request = Request::Write {
            address,
            command,
            data: data.to_string(),
        };

        match self.exchange(request).await? {
            Reply::Ack => Ok(true),
            Reply::Nak | Reply::Eot => Ok(false),
            Reply::Data { .. } => Err(DriverError::Protocol(format!(
                "data reply to write of {}",
                command
            ))),
        }
    }

    async fn close(&mut self) {
        if let Err(e) = SinkExt::<Request>::close(&mut self.framed).await {
            debug!("error closing transport: {}", e);
        }
    }
}

pub struct TcpConnector {
    host: String,
    port: u16,
    io_timeout: Duration,
}

impl TcpConnector {
    pub fn new(host: String, port: u16, io_timeout: Duration) -> Self {
        Self {
            host,
            port,
            io_timeout,
        }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self) -> Result<Box<dyn Transport>, DriverError> {
        let address = (self.host.as_str(), self.port);

        let stream = match tokio::time::timeout(
            Duration::from_secs(CONNECT_TIMEOUT_SECS),
            tokio::net::TcpStream::connect(address),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                return Err(DriverError::Connection(format!(
                    "connect timeout after {} seconds",
                    CONNECT_TIMEOUT_SECS
                )))
            }
        };

        // net2 for keepalive, tokio doesn't expose it
        let std_stream = stream.into_std()?;
        if let Err(e) = std_stream.set_keepalive(Some(Duration::new(TCP_KEEPALIVE_SECS, 0))) {
            warn!("Failed to set TCP keepalive: {}", e);
        }
        let stream = tokio::net::TcpStream::from_std(std_stream)?;

        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY: {}", e);
        }

        Ok(Box::new(FramedTransport::new(stream, self.io_timeout)))
    }

    fn describe(&self) -> String {
        format!("tcp://{}:{}", self.host, self.port)
    }
}

/// Serial link, fixed at 9600 baud 7E1.
pub struct SerialConnector {
    path: String,
    io_timeout: Duration,
}

impl SerialConnector {
    pub fn new(path: String, io_timeout: Duration) -> Self {
        Self { path, io_timeout }
    }
}

#[async_trait]
impl Connector for SerialConnector {
    async fn connect(&self) -> Result<Box<dyn Transport>, DriverError> {
        let port = tokio_serial::new(&self.path, SERIAL_BAUD_RATE)
            .data_bits(tokio_serial::DataBits::Seven)
            .parity(tokio_serial::Parity::Even)
            .stop_bits(tokio_serial::StopBits::One)
            .timeout(self.io_timeout)
            .open_native_async()
            .map_err(|e| {
                DriverError::Connection(format!("can't open serial port {}: {}", self.path, e))
            })?;

        Ok(Box::new(FramedTransport::new(port, self.io_timeout)))
    }

    fn describe(&self) -> String {
        format!("serial://{}", self.path)
    }
}

/// Owns the transport for the driver task. No retry timer of its own; the
/// next tick is the retry.
pub struct ConnectionManager {
    connector: Box<dyn Connector>,
    transport: Option<Box<dyn Transport>>,
}

impl ConnectionManager {
    pub fn new(connector: Box<dyn Connector>) -> Self {
        Self {
            connector,
            transport: None,
        }
    }

    /// Open a transport unless one is live. Returns true when a new one was opened.
    pub async fn ensure_connected(&mut self) -> Result<bool, DriverError> {
        if self.transport.is_some() {
            return Ok(false);
        }

        info!("connecting to WR3223 at {}", self.connector.describe());
        let transport = self.connector.connect().await?;
        info!("connected to WR3223 at {}", self.connector.describe());

        self.transport = Some(transport);
        Ok(true)
    }

    pub fn transport(&mut self) -> Result<&mut dyn Transport, DriverError> {
        match self.transport.as_deref_mut() {
            Some(transport) => Ok(transport),
            None => Err(DriverError::Connection("not connected".to_string())),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    pub async fn close(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.close().await;
            info!("disconnected from WR3223 at {}", self.connector.describe());
        }
    }
}
