pub mod control;
pub mod transport;
mod error;

pub use control::*;
pub use error::DecodeError;
pub use transport::*;

use bytes::{Buf, BufMut};

/// Trait for types that know how to encode/decode themselves using
/// the test bench wire format (big-endian, no framing).
pub trait WireEncodable: Sized {
    /// Encode this value into the destination buffer.
    fn encode_wire(&self, dst: &mut impl BufMut);

    /// Decode a value of this type from the source buffer.
    fn decode_wire(src: &mut impl Buf) -> Result<Self, DecodeError>;
}

/// Messages exchanged on the control stream.
///
/// The stream carries no framing, so every control message has a fixed size
/// known to both ends before the read is issued.
pub trait ControlMessage: WireEncodable {
    /// Exact number of bytes this message occupies on the wire.
    const WIRE_SIZE: usize;
}
