use std::fmt;

use crate::io::{Decodeable, Encodeable};

/// Identifies a single fixed-size block of a file: the unit of disk I/O
/// and of page-level locking.
///
/// Grounded on the teacher's `BTreePageID` (`btree/page/page_id.rs`), but
/// generalized: `BTreePageID` is specific to one B-tree file's page
/// categories, while `BlockId` names any block of any file (data file,
/// leaf file, directory file) by name + block number, matching spec §3.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct BlockId {
    file_name: [u8; 64],
    file_name_len: u8,
    block_number: u32,
}

impl BlockId {
    pub fn new(file_name: &str, block_number: u32) -> Self {
        assert!(
            file_name.len() <= 64,
            "file name too long for fixed-size BlockId: {}",
            file_name
        );
        let mut buf = [0u8; 64];
        buf[..file_name.len()].copy_from_slice(file_name.as_bytes());
        Self {
            file_name: buf,
            file_name_len: file_name.len() as u8,
            block_number,
        }
    }

    pub fn file_name(&self) -> &str {
        std::str::from_utf8(&self.file_name[..self.file_name_len as usize]).unwrap()
    }

    pub fn block_number(&self) -> u32 {
        self.block_number
    }
}

impl PartialOrd for BlockId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BlockId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.file_name(), self.block_number).cmp(&(other.file_name(), other.block_number))
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[file {}, block {}]", self.file_name(), self.block_number)
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl Encodeable for BlockId {
    fn encode(&self) -> Vec<u8> {
        let mut buf = self.file_name().to_string().encode();
        buf.extend_from_slice(&self.block_number.to_be_bytes());
        buf
    }
}

impl Decodeable for BlockId {
    fn decode_from<R: std::io::Read>(reader: &mut R) -> Self {
        let file_name = String::decode_from(reader);
        let block_number = u32::decode_from(reader);
        BlockId::new(&file_name, block_number)
    }
}
