use std::fmt;

use crate::{
    block_id::BlockId,
    io::{Decodeable, Encodeable},
};

/// Record identifier: points to a row in a data file (spec §3).
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Rid {
    block: BlockId,
    slot: u32,
}

impl Rid {
    pub fn new(block: BlockId, slot: u32) -> Self {
        Self { block, slot }
    }

    pub fn block(&self) -> &BlockId {
        &self.block
    }

    pub fn slot(&self) -> u32 {
        self.slot
    }

    pub fn block_number(&self) -> u32 {
        self.block.block_number()
    }
}

impl fmt::Display for Rid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<Rid {} slot {}>", self.block, self.slot)
    }
}

impl fmt::Debug for Rid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl Encodeable for Rid {
    fn encode(&self) -> Vec<u8> {
        let mut buf = self.block.encode();
        buf.extend_from_slice(&self.slot.to_be_bytes());
        buf
    }
}

impl Decodeable for Rid {
    fn decode_from<R: std::io::Read>(reader: &mut R) -> Self {
        let block = BlockId::decode_from(reader);
        let slot = u32::decode_from(reader);
        Rid::new(block, slot)
    }
}
