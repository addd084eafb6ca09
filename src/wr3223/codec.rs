use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::DriverError;
use crate::wr3223::commands::Wr3223Command;

pub const STX: u8 = 0x02;
pub const ETX: u8 = 0x03;
pub const EOT: u8 = 0x04;
pub const ENQ: u8 = 0x05;
pub const ACK: u8 = 0x06;
pub const NAK: u8 = 0x15;

// data replies are a handful of digits; anything this long is line noise
const MAX_FRAME_SIZE: usize = 64;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Request {
    Read {
        address: u8,
        command: Wr3223Command,
    },
    Write {
        address: u8,
        command: Wr3223Command,
        data: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    Data { command: [u8; 2], payload: String },
    Ack,
    Nak,
    Eot,
}

/// Controller address as sent on the wire: at least two decimal digits,
/// every digit repeated once (address 1 is `0011`).
pub fn address_bytes(address: u8) -> Vec<u8> {
    format!("{:02}", address)
        .bytes()
        .flat_map(|digit| [digit, digit])
        .collect()
}

/// Block check character: XOR over everything after STX up to and including ETX.
pub fn bcc(data: &[u8]) -> u8 {
    data.iter().fold(0, |acc, b| acc ^ b)
}

#[derive(Debug, Default)]
pub struct Wr3223Codec;

impl Wr3223Codec {
    pub fn new() -> Self {
        Self
    }
}

impl Encoder<Request> for Wr3223Codec {
    type Error = DriverError;

    fn encode(&mut self, request: Request, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match request {
            Request::Read { address, command } => {
                dst.put_u8(EOT);
                dst.extend_from_slice(&address_bytes(address));
                dst.extend_from_slice(&command.bytes());
                dst.put_u8(ENQ);
            }
            Request::Write {
                address,
                command,
                data,
            } => {
                dst.put_u8(EOT);
                dst.extend_from_slice(&address_bytes(address));
                dst.put_u8(STX);

                let start = dst.len();
                dst.extend_from_slice(&command.bytes());
                dst.extend_from_slice(data.as_bytes());
                dst.put_u8(ETX);
                let checksum = bcc(&dst[start..]);
                dst.put_u8(checksum);
            }
        }

        Ok(())
    }
}

impl Decoder for Wr3223Codec {
    type Item = Reply;
    type Error = DriverError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Reply>, Self::Error> {
        // skip anything that can't start a reply
        loop {
            match src.first() {
                None => return Ok(None),
                Some(&ACK) => {
                    src.advance(1);
                    return Ok(Some(Reply::Ack));
                }
                Some(&NAK) => {
                    src.advance(1);
                    return Ok(Some(Reply::Nak));
                }
                Some(&EOT) => {
                    src.advance(1);
                    return Ok(Some(Reply::Eot));
                }
                Some(&STX) => break,
                Some(_) => src.advance(1),
            }
        }

        let etx = match src.iter().position(|b| *b == ETX) {
            Some(etx) => etx,
            None => {
                if src.len() > MAX_FRAME_SIZE {
                    src.clear();
                    return Err(DriverError::Protocol(format!(
                        "no ETX within {} bytes",
                        MAX_FRAME_SIZE
                    )));
                }
                return Ok(None);
            }
        };

        // wait for the BCC byte following ETX
        if src.len() < etx + 2 {
            return Ok(None);
        }

        let frame = src.split_to(etx + 2);
        if etx < 3 {
            return Err(DriverError::Protocol(format!(
                "data reply too short: {:?}",
                frame.as_ref()
            )));
        }

        let expected = bcc(&frame[1..=etx]);
        let received = frame[etx + 1];
        if expected != received {
            return Err(DriverError::Protocol(format!(
                "BCC mismatch: expected {:#04x}, received {:#04x}",
                expected, received
            )));
        }

        Ok(Some(Reply::Data {
            command: [frame[1], frame[2]],
            payload: String::from_utf8_lossy(&frame[3..etx]).into_owned(),
        }))
    }
}
