use std::net::{Ipv4Addr, SocketAddrV4};

use bytes::{Buf, BufMut};

use crate::protocol::packet::{DecodeError, WireEncodable};

impl WireEncodable for Ipv4Addr {
    fn encode_wire(&self, dst: &mut impl BufMut) {
        dst.put_slice(&self.octets());
    }

    fn decode_wire(src: &mut impl Buf) -> Result<Self, DecodeError> {
        if src.remaining() < 4 {
            return Err(DecodeError::UnexpectedEof);
        }
        let mut octets = [0u8; 4];
        src.copy_to_slice(&mut octets);
        Ok(Ipv4Addr::from(octets))
    }
}

impl WireEncodable for SocketAddrV4 {
    fn encode_wire(&self, dst: &mut impl BufMut) {
        self.ip().encode_wire(dst);
        self.port().encode_wire(dst);
    }

    fn decode_wire(src: &mut impl Buf) -> Result<Self, DecodeError> {
        let ip = Ipv4Addr::decode_wire(src)?;
        let port = u16::decode_wire(src)?;
        Ok(SocketAddrV4::new(ip, port))
    }
}
