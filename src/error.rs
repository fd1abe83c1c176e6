use std::io;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::ConfigError;
use crate::protocol::packet::{DecodeError, Status};

/// Crate-level error.
///
/// Setup variants (`Config`, `Resolve`, `NoIpv4Address`, `Bind`, `Listen`)
/// surface before any test traffic flows. The rest end a single session.
#[derive(Error, Debug)]
pub enum UdptestError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to resolve {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("{0} did not resolve to any IPv4 address")]
    NoIpv4Address(String),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("Failed to listen on {addr}: {source}")]
    Listen {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("Control stream failed: {0}")]
    Control(#[from] ControlError),

    #[error("Server rejected request: {0}")]
    Rejected(Status),

    #[error("Transport socket failed: {0}")]
    Transport(#[source] io::Error),
}

/// Failure of a single control exchange.
#[derive(Error, Debug)]
pub enum ControlError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed message: {0}")]
    Decode(#[from] DecodeError),
}
