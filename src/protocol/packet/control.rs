//! Control-stream messages used to open and close a transport session.

use std::fmt;
use std::net::SocketAddrV4;

use bytes::{Buf, BufMut};

use crate::protocol::{
    constants,
    packet::{ControlMessage, DecodeError, WireEncodable},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    Open = 0x01,
    Close = 0x02,
}

impl WireEncodable for Command {
    fn encode_wire(&self, dst: &mut impl BufMut) {
        (*self as u8).encode_wire(dst);
    }

    fn decode_wire(src: &mut impl Buf) -> Result<Self, DecodeError> {
        match u8::decode_wire(src)? {
            0x01 => Ok(Command::Open),
            0x02 => Ok(Command::Close),
            other => Err(DecodeError::UnknownCommand(other)),
        }
    }
}

/// Client to server control request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    pub command: Command,
    /// Payload size of every `RandomPacket` in the session. Ignored on Close.
    pub payload_size: u32,
}

impl Request {
    pub fn open(payload_size: u32) -> Self {
        Self {
            command: Command::Open,
            payload_size,
        }
    }

    pub fn close() -> Self {
        Self {
            command: Command::Close,
            payload_size: 0,
        }
    }
}

impl WireEncodable for Request {
    fn encode_wire(&self, dst: &mut impl BufMut) {
        self.command.encode_wire(dst);
        self.payload_size.encode_wire(dst);
    }

    fn decode_wire(src: &mut impl Buf) -> Result<Self, DecodeError> {
        Ok(Self {
            command: Command::decode_wire(src)?,
            payload_size: u32::decode_wire(src)?,
        })
    }
}

impl ControlMessage for Request {
    const WIRE_SIZE: usize = constants::REQUEST_SIZE;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Ok = 0,
    AlreadyOpen = 1,
    FailedToOpen = 2,
    FailedToClose = 3,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Ok => "OK",
            Status::AlreadyOpen => "transport already open",
            Status::FailedToOpen => "failed to open transport",
            Status::FailedToClose => "failed to close transport",
        };
        f.write_str(s)
    }
}

impl WireEncodable for Status {
    fn encode_wire(&self, dst: &mut impl BufMut) {
        (*self as u8).encode_wire(dst);
    }

    fn decode_wire(src: &mut impl Buf) -> Result<Self, DecodeError> {
        match u8::decode_wire(src)? {
            0 => Ok(Status::Ok),
            1 => Ok(Status::AlreadyOpen),
            2 => Ok(Status::FailedToOpen),
            3 => Ok(Status::FailedToClose),
            other => Err(DecodeError::UnknownStatus(other)),
        }
    }
}

/// Server to client control response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response {
    pub status: Status,
    /// Transport endpoint bound for the session; unspecified unless the
    /// response acknowledges a successful Open.
    pub endpoint: SocketAddrV4,
}

impl Response {
    pub fn ok(endpoint: SocketAddrV4) -> Self {
        Self {
            status: Status::Ok,
            endpoint,
        }
    }

    pub fn status(status: Status) -> Self {
        Self {
            status,
            endpoint: constants::UNSPECIFIED_ENDPOINT,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }
}

impl WireEncodable for Response {
    fn encode_wire(&self, dst: &mut impl BufMut) {
        self.status.encode_wire(dst);
        self.endpoint.encode_wire(dst);
    }

    fn decode_wire(src: &mut impl Buf) -> Result<Self, DecodeError> {
        Ok(Self {
            status: Status::decode_wire(src)?,
            endpoint: SocketAddrV4::decode_wire(src)?,
        })
    }
}

impl ControlMessage for Response {
    const WIRE_SIZE: usize = constants::RESPONSE_SIZE;
}
