//! Tokio-based sockets for the control stream and the measured UDP path.
//!
//! This module exposes:
//! - `ControlChannel` for half-duplex request/response exchanges over TCP.
//! - `TransportSession` for the server-side UDP echo loop of one session.
//! - `Listener` for accepting control connections.
//!
//! Session state (what to do with a request) lives in the `session` module;
//! pacing and accounting live on the client.

use std::net::SocketAddr;

use tokio::net::lookup_host;

use crate::UdptestError;

pub mod control;
pub mod echo;
pub mod listener;

pub use control::ControlChannel;
pub use echo::TransportSession;
pub use listener::Listener;

/// Resolves `host:port` to its first IPv4 address.
///
/// Both the control and the transport endpoints are IPv4 only, since the
/// `Response` layout carries a 4 byte address.
pub async fn resolve_ipv4(host: &str, port: u16) -> Result<SocketAddr, UdptestError> {
    let addrs = lookup_host((host, port))
        .await
        .map_err(|source| UdptestError::Resolve {
            host: host.to_string(),
            source,
        })?;

    let mut addrs = addrs.filter(SocketAddr::is_ipv4);
    addrs
        .next()
        .ok_or_else(|| UdptestError::NoIpv4Address(host.to_string()))
}
