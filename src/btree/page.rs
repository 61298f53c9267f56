//! The slotted-page record buffer shared by leaf and directory pages
//! (spec §3 "B-tree slotted page layout" / §6 "slotted page byte
//! format"): a small fixed header (two reserved i64 flag slots, or one
//! for directory pages, plus a u32 record count) followed by
//! fixed-width, key-sorted records.
//!
//! Grounded on the teacher's `btree::page::leaf_page::BTreeLeafPage`
//! (`calculate_slots_count`, `calculate_header_size`, shift-based
//! `insert_tuple`/`delete_tuple`), generalized into one buffer type
//! reused by both the leaf and directory pages, since spec §3 gives both
//! the same general shape and only the payload width (and presence of
//! `flag_1`) differs.

use std::io::Cursor;

use crate::{
    btree::consts::{DIR_HEADER_SIZE, LEAF_HEADER_SIZE},
    file_mgr::BLOCK_SIZE,
    io::{Decodeable, Encodeable},
    value::{Constant, Type},
};

/// Which of the two slotted-page layouts a buffer holds (spec §6): leaf
/// pages reserve both `flag_0` and `flag_1`; directory pages reserve
/// only `flag_0` (their level), so `num_records` starts 8 bytes earlier.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum PageKind {
    Leaf,
    Directory,
}

impl PageKind {
    fn header_size(self) -> usize {
        match self {
            PageKind::Leaf => LEAF_HEADER_SIZE,
            PageKind::Directory => DIR_HEADER_SIZE,
        }
    }

    fn has_flag1(self) -> bool {
        matches!(self, PageKind::Leaf)
    }
}

pub struct SlottedBuf {
    bytes: Vec<u8>,
    key_type: Type,
    payload_size: usize,
    kind: PageKind,
}

impl SlottedBuf {
    pub fn new(bytes: Vec<u8>, key_type: Type, payload_size: usize, kind: PageKind) -> Self {
        assert_eq!(bytes.len(), BLOCK_SIZE);
        Self {
            bytes,
            key_type,
            payload_size,
            kind,
        }
    }

    pub fn empty(key_type: Type, payload_size: usize, kind: PageKind) -> Self {
        let mut buf = Self::new(vec![0u8; BLOCK_SIZE], key_type, payload_size, kind);
        buf.set_flag0(-1);
        if kind.has_flag1() {
            buf.set_flag1(-1);
        }
        buf
    }

    pub fn record_width(&self) -> usize {
        self.key_type.size() + self.payload_size
    }

    fn header_size(&self) -> usize {
        self.kind.header_size()
    }

    fn num_records_offset(&self) -> usize {
        if self.kind.has_flag1() {
            16
        } else {
            8
        }
    }

    pub fn capacity(&self) -> usize {
        (BLOCK_SIZE - self.header_size()) / self.record_width()
    }

    pub fn num_records(&self) -> usize {
        let off = self.num_records_offset();
        u32::from_be_bytes(self.bytes[off..off + 4].try_into().unwrap()) as usize
    }

    pub fn set_num_records(&mut self, n: usize) {
        let off = self.num_records_offset();
        self.bytes[off..off + 4].copy_from_slice(&(n as u32).to_be_bytes());
    }

    pub fn flag0(&self) -> i64 {
        i64::from_be_bytes(self.bytes[0..8].try_into().unwrap())
    }

    pub fn set_flag0(&mut self, v: i64) {
        self.bytes[0..8].copy_from_slice(&v.to_be_bytes());
    }

    /// Only leaf pages carry a `flag_1` slot (spec §6); calling this on
    /// a directory buffer is a bug in the caller.
    pub fn flag1(&self) -> i64 {
        debug_assert!(self.kind.has_flag1(), "directory pages have no flag_1 slot");
        i64::from_be_bytes(self.bytes[8..16].try_into().unwrap())
    }

    pub fn set_flag1(&mut self, v: i64) {
        debug_assert!(self.kind.has_flag1(), "directory pages have no flag_1 slot");
        self.bytes[8..16].copy_from_slice(&v.to_be_bytes());
    }

    fn record_offset(&self, slot: usize) -> usize {
        self.header_size() + slot * self.record_width()
    }

    pub fn key_at(&self, slot: usize) -> Constant {
        let off = self.record_offset(slot);
        let mut cursor = Cursor::new(&self.bytes[off..off + self.key_type.size()]);
        Constant::decode_from(&mut cursor, self.key_type)
    }

    pub fn payload_at(&self, slot: usize) -> &[u8] {
        let off = self.record_offset(slot) + self.key_type.size();
        &self.bytes[off..off + self.payload_size]
    }

    fn write_record(&mut self, slot: usize, key: &Constant, payload: &[u8]) {
        assert_eq!(payload.len(), self.payload_size);
        let off = self.record_offset(slot);
        let key_bytes = key.encode();
        assert_eq!(key_bytes.len(), self.key_type.size());
        self.bytes[off..off + key_bytes.len()].copy_from_slice(&key_bytes);
        self.bytes[off + key_bytes.len()..off + key_bytes.len() + payload.len()].copy_from_slice(payload);
    }

    /// First slot whose key is `>= key` (the standard B-tree search
    /// position), via binary search over the sorted records.
    pub fn search(&self, key: &Constant) -> usize {
        let mut lo = 0usize;
        let mut hi = self.num_records();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if &self.key_at(mid) < key {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    pub fn is_full(&self) -> bool {
        self.num_records() >= self.capacity()
    }

    /// Insert `(key, payload)` keeping the slots sorted by key. Panics
    /// if the page is already full; callers must check
    /// [`is_full`](Self::is_full) first and split before inserting.
    pub fn insert(&mut self, key: &Constant, payload: &[u8]) -> usize {
        assert!(!self.is_full(), "insert into full slotted page");
        let slot = self.search(key);
        let n = self.num_records();
        let width = self.record_width();
        let from = self.record_offset(slot);
        let to = self.record_offset(slot + 1);
        let tail_len = (n - slot) * width;
        self.bytes.copy_within(from..from + tail_len, to);
        self.write_record(slot, key, payload);
        self.set_num_records(n + 1);
        slot
    }

    pub fn remove(&mut self, slot: usize) {
        let n = self.num_records();
        assert!(slot < n);
        let width = self.record_width();
        let from = self.record_offset(slot + 1);
        let to = self.record_offset(slot);
        let tail_len = (n - slot - 1) * width;
        self.bytes.copy_within(from..from + tail_len, to);
        self.set_num_records(n - 1);
    }

    /// Move every record from `split_at` onward into `other` (which must
    /// be empty), used when splitting a full page (spec §4.4/§4.5
    /// "split").
    pub fn split_into(&mut self, split_at: usize, other: &mut SlottedBuf) {
        let n = self.num_records();
        for slot in split_at..n {
            let key = self.key_at(slot);
            let payload = self.payload_at(slot).to_vec();
            other.insert(&key, &payload);
        }
        self.set_num_records(split_at);
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_keeps_sorted_order() {
        let mut buf = SlottedBuf::empty(Type::Int, 8, PageKind::Leaf);
        buf.insert(&Constant::Int(5), &[0u8; 8]);
        buf.insert(&Constant::Int(1), &[0u8; 8]);
        buf.insert(&Constant::Int(3), &[0u8; 8]);

        assert_eq!(buf.num_records(), 3);
        assert_eq!(buf.key_at(0), Constant::Int(1));
        assert_eq!(buf.key_at(1), Constant::Int(3));
        assert_eq!(buf.key_at(2), Constant::Int(5));
    }

    #[test]
    fn remove_shifts_tail_left() {
        let mut buf = SlottedBuf::empty(Type::Int, 8, PageKind::Leaf);
        for v in [1, 2, 3] {
            buf.insert(&Constant::Int(v), &[0u8; 8]);
        }
        buf.remove(1);
        assert_eq!(buf.num_records(), 2);
        assert_eq!(buf.key_at(0), Constant::Int(1));
        assert_eq!(buf.key_at(1), Constant::Int(3));
    }

    #[test]
    fn split_into_moves_upper_half() {
        let mut a = SlottedBuf::empty(Type::Int, 8, PageKind::Leaf);
        for v in [1, 2, 3, 4] {
            a.insert(&Constant::Int(v), &[0u8; 8]);
        }
        let mut b = SlottedBuf::empty(Type::Int, 8, PageKind::Leaf);
        a.split_into(2, &mut b);

        assert_eq!(a.num_records(), 2);
        assert_eq!(b.num_records(), 2);
        assert_eq!(b.key_at(0), Constant::Int(3));
    }

    #[test]
    fn directory_pages_have_no_flag1_slot_and_a_smaller_header() {
        let dir = SlottedBuf::empty(Type::Int, 8, PageKind::Directory);
        let leaf = SlottedBuf::empty(Type::Int, 8, PageKind::Leaf);
        assert!(dir.capacity() > leaf.capacity(), "a smaller header must fit more records");
    }
}
