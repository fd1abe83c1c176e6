//! Datagrams carried on the measured UDP path.

use bytes::{Buf, BufMut, Bytes};

use crate::protocol::{
    constants,
    packet::{DecodeError, WireEncodable},
    types::Sequence,
};

/// Sequenced datagram emitted by the client pacer.
///
/// The payload content is opaque; only its length is negotiated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RandomPacket {
    pub seq: Sequence,
    pub payload: Bytes,
}

impl RandomPacket {
    pub fn new(seq: Sequence, payload: Bytes) -> Self {
        Self { seq, payload }
    }

    /// Total on-wire size: sequence header plus payload.
    pub fn wire_len(&self) -> usize {
        constants::SEQUENCE_HEADER_SIZE + self.payload.len()
    }

    /// Reads only the sequence number from a raw datagram, leaving the
    /// payload untouched.
    pub fn peek_seq(datagram: &[u8]) -> Result<Sequence, DecodeError> {
        let mut src = datagram;
        Sequence::decode_wire(&mut src)
    }
}

impl WireEncodable for RandomPacket {
    fn encode_wire(&self, dst: &mut impl BufMut) {
        self.seq.encode_wire(dst);
        dst.put_slice(&self.payload);
    }

    /// Consumes the rest of `src` as payload.
    fn decode_wire(src: &mut impl Buf) -> Result<Self, DecodeError> {
        let seq = Sequence::decode_wire(src)?;
        let remaining = src.remaining();
        let payload = src.copy_to_bytes(remaining);
        Ok(Self { seq, payload })
    }
}

/// Echo sent by the server for every `RandomPacket` it receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketAck {
    pub seq: Sequence,
}

impl WireEncodable for PacketAck {
    fn encode_wire(&self, dst: &mut impl BufMut) {
        self.seq.encode_wire(dst);
    }

    fn decode_wire(src: &mut impl Buf) -> Result<Self, DecodeError> {
        Ok(Self {
            seq: Sequence::decode_wire(src)?,
        })
    }
}
