use thiserror::Error;

/// Errors that may occur while decoding wire values or messages.
///
/// Shared by every `WireEncodable` implementation. Payload bytes are opaque,
/// so the only failures are short buffers and unknown discriminants.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The buffer did not contain enough bytes to decode the requested value.
    #[error("Unexpected EoF, not enough bytes to read requested type.")]
    UnexpectedEof,

    /// A request command byte that does not map to any known command.
    #[error("Unknown request command: 0x{0:02x}")]
    UnknownCommand(u8),

    /// A response status byte that does not map to any known status.
    #[error("Unknown response status: {0}")]
    UnknownStatus(u8),
}
