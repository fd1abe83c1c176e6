use std::fmt;

use crate::protocol::packet::{DecodeError, WireEncodable};

/// Per-packet sequence number linking a send to its ack.
///
/// Sequences start at zero and only ever move forward by one; the server
/// never creates one, it echoes what it receives.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Sequence(u32);

impl Sequence {
    pub const ZERO: Sequence = Sequence(0);

    pub fn new(v: u32) -> Sequence {
        Sequence(v)
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    pub fn next(&self) -> Sequence {
        Sequence(self.0.wrapping_add(1))
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl WireEncodable for Sequence {
    fn encode_wire(&self, dst: &mut impl bytes::BufMut) {
        self.0.encode_wire(dst);
    }

    fn decode_wire(src: &mut impl bytes::Buf) -> Result<Self, DecodeError> {
        Ok(Sequence(u32::decode_wire(src)?))
    }
}
