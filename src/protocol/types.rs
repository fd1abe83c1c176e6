use crate::protocol::packet::{DecodeError, WireEncodable};
use bytes::{Buf, BufMut};
use std::mem;

mod primitives;
mod sequence;

pub use sequence::Sequence;

macro_rules! impl_wire_int {
    ($ty:ty, $put:ident, $get:ident) => {
        impl WireEncodable for $ty {
            fn encode_wire(&self, dst: &mut impl BufMut) {
                dst.$put(*self);
            }

            fn decode_wire(src: &mut impl Buf) -> Result<Self, DecodeError> {
                if src.remaining() < mem::size_of::<$ty>() {
                    return Err(DecodeError::UnexpectedEof);
                }
                Ok(src.$get())
            }
        }
    };
}

// Network byte order throughout.
impl_wire_int!(u8, put_u8, get_u8);
impl_wire_int!(u16, put_u16, get_u16);
impl_wire_int!(u32, put_u32, get_u32);
