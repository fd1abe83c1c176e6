use std::{
    net::{Ipv4Addr, SocketAddrV4},
    time::Duration,
};

/// Largest UDP payload that fits in a single IPv4 datagram.
pub const MAXIMUM_DATAGRAM_SIZE: usize = 65507;

/// Bytes taken by the sequence number at the front of every `RandomPacket`.
pub const SEQUENCE_HEADER_SIZE: usize = 4;

/// Largest payload a session may negotiate.
pub const MAXIMUM_PAYLOAD_SIZE: usize = MAXIMUM_DATAGRAM_SIZE - SEQUENCE_HEADER_SIZE;

pub const REQUEST_SIZE: usize = 5;
pub const RESPONSE_SIZE: usize = 7;
pub const PACKET_ACK_SIZE: usize = 4;

pub const MICROS_PER_SECOND: u64 = 1_000_000;

/// Period of the windowed throughput report.
pub const REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// How long the client keeps reading acks after the run deadline.
pub const ACK_DRAIN_TIMEOUT: Duration = Duration::from_millis(250);

/// Endpoint carried by every non-OK `Response`.
pub const UNSPECIFIED_ENDPOINT: SocketAddrV4 = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0);

/*
 * CLI defaults
 */
pub const DEFAULT_ADDRESS: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5601;
pub const DEFAULT_BITRATE: &str = "1M";
pub const DEFAULT_PACKET_RATE: u32 = 100;
pub const DEFAULT_DURATION_SECS: u64 = 10;
