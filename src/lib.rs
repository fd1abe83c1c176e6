//! UDP throughput, loss and latency test bench.
//!
//! A client paces sequenced datagrams at a server that echoes each sequence
//! number back. Session setup and teardown are negotiated over a TCP control
//! stream; the measured path is plain UDP.
//!
//! - [`Server`] accepts control connections and opens one echo socket per
//!   session.
//! - [`Client`] opens a session, drives the pacer, matches acks and reports
//!   throughput, loss and latency.
//!
//! Both sides take a shutdown future so the caller decides how shutdown is
//! delivered.

pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod server;
pub mod session;
pub mod transport;

pub use client::{Client, RunReport};
pub use config::{ClientConfig, ConfigError, PacketPlan, ServerConfig};
pub use error::{ControlError, UdptestError};
pub use server::Server;
