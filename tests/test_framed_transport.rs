use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

use wr3223_bridge::error::DriverError;
use wr3223_bridge::wr3223::codec::{bcc, ACK, ENQ, EOT, ETX, NAK, STX};
use wr3223_bridge::wr3223::connection::{FramedTransport, RawResponse, Transport};
use wr3223_bridge::wr3223::Wr3223Command;

fn data_frame(command: &str, payload: &str) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(command.as_bytes());
    body.extend_from_slice(payload.as_bytes());
    body.push(ETX);
    let checksum = bcc(&body);

    let mut frame = vec![STX];
    frame.extend_from_slice(&body);
    frame.push(checksum);
    frame
}

fn transport() -> (FramedTransport<DuplexStream>, DuplexStream) {
    let (client, controller) = tokio::io::duplex(256);
    (
        FramedTransport::new(client, Duration::from_millis(3000)),
        controller,
    )
}

async fn request(controller: &mut DuplexStream, len: usize) -> Vec<u8> {
    let mut buf = vec![0; len];
    controller.read_exact(&mut buf).await.unwrap();
    buf
}

#[tokio::test]
async fn reads_a_value() {
    let (mut transport, mut controller) = transport();
    controller.write_all(&data_frame("T3", "-4.5")).await.unwrap();

    let response = transport.read(1, Wr3223Command::T3).await.unwrap();

    assert_eq!(response, RawResponse::Value("-4.5".to_string()));
    assert_eq!(
        request(&mut controller, 8).await,
        vec![EOT, b'0', b'0', b'1', b'1', b'T', b'3', ENQ]
    );
}

#[tokio::test]
async fn sentinel_and_eot_mean_unsupported() {
    let (mut transport, mut controller) = transport();

    controller.write_all(&data_frame("T7", "???")).await.unwrap();
    assert_eq!(
        transport.read(1, Wr3223Command::T7).await.unwrap(),
        RawResponse::Unsupported
    );

    controller.write_all(&[EOT]).await.unwrap();
    assert_eq!(
        transport.read(1, Wr3223Command::T8).await.unwrap(),
        RawResponse::Unsupported
    );
}

#[tokio::test]
async fn write_is_acked() {
    let (mut transport, mut controller) = transport();
    controller.write_all(&[ACK]).await.unwrap();

    assert!(transport.write(1, Wr3223Command::SW, "43").await.unwrap());

    let sent = request(&mut controller, 12).await;
    assert_eq!(&sent[..6], &[EOT, b'0', b'0', b'1', b'1', STX]);
    assert_eq!(&sent[6..11], b"SW43\x03");
    assert_eq!(sent[11], bcc(b"SW43\x03"));
}

#[tokio::test]
async fn write_is_rejected() {
    let (mut transport, mut controller) = transport();
    controller.write_all(&[NAK]).await.unwrap();

    assert!(!transport.write(1, Wr3223Command::MD, "3").await.unwrap());
}

#[tokio::test]
async fn reply_for_another_command_is_a_protocol_error() {
    let (mut transport, mut controller) = transport();
    controller.write_all(&data_frame("T2", "20")).await.unwrap();

    assert!(matches!(
        transport.read(1, Wr3223Command::T1).await,
        Err(DriverError::Protocol(_))
    ));
}

#[tokio::test]
async fn stale_bytes_do_not_leak_into_next_exchange() {
    let (mut transport, mut controller) = transport();
    controller.write_all(&data_frame("T2", "20")).await.unwrap();
    assert!(transport.read(1, Wr3223Command::T1).await.is_err());

    controller.write_all(&data_frame("T1", "7")).await.unwrap();
    assert_eq!(
        transport.read(1, Wr3223Command::T1).await.unwrap(),
        RawResponse::Value("7".to_string())
    );
}

#[tokio::test(start_paused = true)]
async fn silent_controller_times_out() {
    let (mut transport, _controller) = transport();

    let err = transport.read(1, Wr3223Command::T1).await.unwrap_err();

    assert!(matches!(err, DriverError::Connection(_)));
    assert!(err.is_fatal_to_connection());
}

#[tokio::test]
async fn closed_connection_is_a_connection_error() {
    let (mut transport, controller) = transport();
    drop(controller);

    assert!(matches!(
        transport.read(1, Wr3223Command::T1).await,
        Err(DriverError::Connection(_))
    ));
}
