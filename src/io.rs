//! Byte-level (de)serialization helpers shared by the page formats and the
//! logical-log record writer.
//!
//! Spec §6 requires all on-disk integers to be big-endian; this differs
//! from the teacher crate's little-endian `Encodeable`/`Decodeable` (the
//! wire format here is dictated by spec, not by the teacher's convention).

use std::{convert::TryInto, io::Read, mem::size_of};

pub trait Encodeable {
    fn encode(&self) -> Vec<u8>;
}

pub trait Decodeable {
    fn decode_from<R: Read>(reader: &mut R) -> Self;
}

pub fn read_exact<R: Read>(reader: &mut R, bytes_count: usize) -> Vec<u8> {
    let mut buffer = vec![0u8; bytes_count];
    reader
        .read_exact(&mut buffer)
        .unwrap_or_else(|_| panic!("io error, expected {} bytes", bytes_count));
    buffer
}

macro_rules! impl_serialization {
    (for $($t:ty),+) => {
        $(
            impl Encodeable for $t {
                fn encode(&self) -> Vec<u8> {
                    self.to_be_bytes().to_vec()
                }
            }

            impl Decodeable for $t {
                fn decode_from<R: Read>(reader: &mut R) -> Self {
                    let bytes = read_exact(reader, size_of::<Self>());
                    Self::from_be_bytes(bytes.try_into().unwrap())
                }
            }
        )*
    }
}

impl_serialization!(for u8, u16, u32, u64, i8, i16, i32, i64, usize);

impl Encodeable for bool {
    fn encode(&self) -> Vec<u8> {
        vec![*self as u8]
    }
}

impl Decodeable for bool {
    fn decode_from<R: Read>(reader: &mut R) -> Self {
        u8::decode_from(reader) == 1
    }
}

impl Encodeable for String {
    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        let bytes = self.as_bytes();
        buf.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
        buf.extend_from_slice(bytes);
        buf
    }
}

impl Decodeable for String {
    fn decode_from<R: Read>(reader: &mut R) -> Self {
        let len = u32::decode_from(reader) as usize;
        let bytes = read_exact(reader, len);
        String::from_utf8(bytes).unwrap()
    }
}
