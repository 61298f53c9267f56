use std::{cmp::Ordering, fmt};

use crate::io::{read_exact, Decodeable, Encodeable};

/// A field type: fixes the serialized width and comparison semantics of a
/// `Constant`.
///
/// Grounded on the teacher's `storage::schema::types::Type` (`Bool`,
/// `Int64`, `Float64`, `Bytes(u8)`), generalized with the `min_value`
/// sentinel spec §3 requires of every type (a value strictly below every
/// legal value of that type, used as the leftmost directory-entry key,
/// spec §4.5 "Search with crabbing").
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum Type {
    Int,
    Varchar(u8),
}

impl Type {
    /// Fixed on-disk serialized width of this type (spec §3).
    pub fn size(&self) -> usize {
        match self {
            Type::Int => 4,
            Type::Varchar(width) => *width as usize,
        }
    }
}

/// A tagged, totally-ordered value (spec §3).
///
/// Grounded on the teacher's `field::IntField`, generalized from a single
/// `i32` payload to a tagged enum so the index can key on more than one
/// type, as `storage::schema::types::Type` anticipates.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Constant {
    Int(i32),
    Varchar(Type, Vec<u8>),
}

impl Constant {
    pub fn get_type(&self) -> Type {
        match self {
            Constant::Int(_) => Type::Int,
            Constant::Varchar(t, _) => *t,
        }
    }

    /// A sentinel strictly below every legal value of `t`; used as the
    /// key of the leftmost directory entry (spec §3, §4.5).
    pub fn min_value(t: Type) -> Constant {
        match t {
            Type::Int => Constant::Int(i32::MIN),
            Type::Varchar(width) => Constant::Varchar(t, vec![0u8; width as usize]),
        }
    }
}

impl PartialOrd for Constant {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Constant {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Constant::Int(a), Constant::Int(b)) => a.cmp(b),
            (Constant::Varchar(_, a), Constant::Varchar(_, b)) => a.cmp(b),
            _ => panic!("cannot compare constants of different types"),
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Constant::Int(v) => write!(f, "{}", v),
            Constant::Varchar(_, bytes) => {
                write!(f, "{:?}", String::from_utf8_lossy(bytes))
            }
        }
    }
}

impl Encodeable for Constant {
    fn encode(&self) -> Vec<u8> {
        match self {
            Constant::Int(v) => v.encode(),
            Constant::Varchar(t, bytes) => {
                let mut buf = bytes.clone();
                buf.resize(t.size(), 0);
                buf
            }
        }
    }
}

impl Constant {
    /// Decode a constant of the given type from a fixed-width slot.
    pub fn decode_from<R: std::io::Read>(reader: &mut R, t: Type) -> Self {
        match t {
            Type::Int => Constant::Int(i32::decode_from(reader)),
            Type::Varchar(width) => {
                Constant::Varchar(t, read_exact(reader, width as usize))
            }
        }
    }
}
