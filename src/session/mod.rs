//! Server-side control sessions.
//!
//! A `Connection` owns one control stream and at most one
//! `TransportSession`. It runs as its own task; the `ConnectionRegistry`
//! tracks the live ones and tears them down.

mod connection;
mod registry;

pub use connection::Connection;
pub use registry::{ConnectionId, ConnectionRegistry};
