//! The buffer frame (spec §3 "Buffer frame", component C1): one in-memory
//! copy of a disk block plus the bookkeeping the pool and the
//! transactional layer need to know whether it is safe to evict or must
//! be flushed first.
//!
//! Grounded on the teacher's `btree::page_cache::PageCache` dirty-page
//! bookkeeping (`set_before_image`/`flush_pages`), generalized to a
//! fixed per-frame pin count rather than a `ConcurrentHashMap` of
//! unboundedly many pages, per spec §4.1.

use crate::{block_id::BlockId, file_mgr::FileMgr};

pub struct Frame {
    contents: Vec<u8>,
    block: Option<BlockId>,
    pins: i32,
    /// Id of the transaction that last modified this frame, or `None` if
    /// it is clean since its last flush.
    modifying_tx: Option<u32>,
}

impl Frame {
    pub fn new(block_size: usize) -> Self {
        Self {
            contents: vec![0u8; block_size],
            block: None,
            pins: 0,
            modifying_tx: None,
        }
    }

    pub fn contents(&self) -> &[u8] {
        &self.contents
    }

    pub fn contents_mut(&mut self) -> &mut [u8] {
        &mut self.contents
    }

    pub fn block(&self) -> Option<&BlockId> {
        self.block.as_ref()
    }

    pub fn is_pinned(&self) -> bool {
        self.pins > 0
    }

    pub fn modifying_tx(&self) -> Option<u32> {
        self.modifying_tx
    }

    pub fn set_modified(&mut self, tx_id: u32) {
        self.modifying_tx = Some(tx_id);
    }

    /// Read `block` in from disk, replacing whatever this frame held
    /// before. The caller (the pool) is responsible for having flushed
    /// any prior dirty contents first.
    pub fn assign_to_block(&mut self, block: BlockId, file_mgr: &FileMgr) -> crate::types::SmallResult {
        self.flush(file_mgr)?;
        file_mgr.read(&block, &mut self.contents)?;
        self.block = Some(block);
        self.pins = 0;
        Ok(())
    }

    /// Like [`assign_to_block`](Self::assign_to_block) but for a block
    /// that was just allocated by the file manager: its on-disk contents
    /// are known-zero, so skip the read.
    pub fn assign_to_new_block(&mut self, block: BlockId, file_mgr: &FileMgr) -> crate::types::SmallResult {
        self.flush(file_mgr)?;
        self.contents.iter_mut().for_each(|b| *b = 0);
        self.block = Some(block);
        self.pins = 0;
        Ok(())
    }

    pub fn flush(&mut self, file_mgr: &FileMgr) -> crate::types::SmallResult {
        if let (Some(tx_id), Some(block)) = (self.modifying_tx, &self.block) {
            let _ = tx_id;
            file_mgr.write(block, &self.contents)?;
            self.modifying_tx = None;
        }
        Ok(())
    }

    pub fn pin(&mut self) {
        self.pins += 1;
    }

    pub fn unpin(&mut self) {
        self.pins -= 1;
    }
}
