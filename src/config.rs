//! Validated run parameters for the server and the client.
//!
//! Everything here is checked before any socket is opened: a configuration
//! that would produce an impossible datagram is rejected up front.

use std::num::{IntErrorKind, ParseIntError};
use std::time::Duration;

use thiserror::Error;

use crate::protocol::constants;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Failed to parse bitrate {0:?}")]
    InvalidBitrate(String),

    #[error("Failed to parse bitrate multiplier {0:?}, expected one of k, m, g")]
    InvalidMultiplier(String),

    #[error("Bitrate {0:?} does not fit in 64 bits")]
    BitrateOverflow(String),

    #[error("Packet rate must be nonzero")]
    ZeroPacketRate,

    #[error("Packet rate {0} exceeds one packet per microsecond")]
    PacketRateTooHigh(u32),

    #[error(
        "Packets would be too small with the given bitrate and packet rate: \
        {bytes} bytes per packet, at least {} needed for the sequence header",
        constants::SEQUENCE_HEADER_SIZE
    )]
    PacketTooSmall { bytes: u64 },

    #[error(
        "Packets would be too large with the given bitrate and packet rate: \
        {payload} byte payload, at most {} allowed",
        constants::MAXIMUM_PAYLOAD_SIZE
    )]
    PacketTooLarge { payload: u64 },
}

/// Parses a bitrate in bits per second.
///
/// Accepts a plain integer optionally followed by a single `k`, `m` or `g`
/// (either case) for powers of 1000.
pub fn parse_bitrate(bitrate: &str) -> Result<u64, ConfigError> {
    let split = bitrate
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(bitrate.len());
    let (digits, suffix) = bitrate.split_at(split);

    let coefficient: u64 = digits.parse().map_err(|e: ParseIntError| match e.kind() {
        IntErrorKind::PosOverflow => ConfigError::BitrateOverflow(bitrate.to_string()),
        _ => ConfigError::InvalidBitrate(bitrate.to_string()),
    })?;

    let multiplier: u64 = match suffix {
        "" => 1,
        "k" | "K" => 1_000,
        "m" | "M" => 1_000_000,
        "g" | "G" => 1_000_000_000,
        other => return Err(ConfigError::InvalidMultiplier(other.to_string())),
    };

    coefficient
        .checked_mul(multiplier)
        .ok_or_else(|| ConfigError::BitrateOverflow(bitrate.to_string()))
}

/// Per-packet layout and send cadence derived from a bitrate and packet rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketPlan {
    /// Payload bytes per `RandomPacket`, excluding the sequence header.
    pub payload_size: u32,
    /// Target gap between consecutive sends.
    pub interval: Duration,
}

impl PacketPlan {
    pub fn new(bitrate: u64, packet_rate: u32) -> Result<Self, ConfigError> {
        if packet_rate == 0 {
            return Err(ConfigError::ZeroPacketRate);
        }
        let rate = u64::from(packet_rate);
        if rate > constants::MICROS_PER_SECOND {
            return Err(ConfigError::PacketRateTooHigh(packet_rate));
        }

        let bytes = bitrate / 8 / rate;
        let payload = bytes
            .checked_sub(constants::SEQUENCE_HEADER_SIZE as u64)
            .ok_or(ConfigError::PacketTooSmall { bytes })?;
        if payload > constants::MAXIMUM_PAYLOAD_SIZE as u64 {
            return Err(ConfigError::PacketTooLarge { payload });
        }

        Ok(Self {
            payload_size: payload as u32,
            interval: Duration::from_micros(constants::MICROS_PER_SECOND / rate),
        })
    }

    /// On-wire bytes of every datagram in the session.
    pub fn datagram_size(&self) -> usize {
        self.payload_size as usize + constants::SEQUENCE_HEADER_SIZE
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Host name or address to listen on.
    pub address: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: constants::DEFAULT_ADDRESS.to_string(),
            port: constants::DEFAULT_PORT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Host name or address of the server's control endpoint.
    pub address: String,
    pub port: u16,
    /// Target bitrate in bits per second.
    pub bitrate: u64,
    /// Target packets per second.
    pub packet_rate: u32,
    /// Length of the measured run.
    pub duration: Duration,
}

impl ClientConfig {
    pub fn plan(&self) -> Result<PacketPlan, ConfigError> {
        PacketPlan::new(self.bitrate, self.packet_rate)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: constants::DEFAULT_ADDRESS.to_string(),
            port: constants::DEFAULT_PORT,
            bitrate: 1_000_000,
            packet_rate: constants::DEFAULT_PACKET_RATE,
            duration: Duration::from_secs(constants::DEFAULT_DURATION_SECS),
        }
    }
}
