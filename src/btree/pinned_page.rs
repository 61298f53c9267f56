//! A block latched (via the lock manager) and pinned (via the
//! transactional buffer manager) for the duration of one B-tree
//! operation step — the unit the crabbing protocol acquires and
//! releases one level at a time (spec §4.5 "Search with crabbing").
//!
//! Grounded on the teacher's `btree::page_cache::PageCache::get_*_page`
//! (each call does `request_lock` then `get_or_insert`), generalized
//! into an RAII guard so callers release deterministically instead of
//! relying on the page cache to outlive the transaction.

use log::error;

use crate::{
    block_id::BlockId,
    database::Database,
    error::{Kind, SmallError},
    types::SmallResult,
};

pub struct PinnedPage<'a> {
    db: &'a Database,
    tx_id: u32,
    block: BlockId,
    frame_idx: usize,
    exclusive: bool,
    released: bool,
}

impl<'a> PinnedPage<'a> {
    pub fn open(db: &'a Database, tx_id: u32, block: BlockId, exclusive: bool) -> Result<Self, SmallError> {
        let lock_result = if exclusive {
            db.lock_mgr().x_lock(tx_id, &block)
        } else {
            db.lock_mgr().s_lock(tx_id, &block)
        };
        if let Err(e) = lock_result {
            return Err(Self::auto_rollback_on_lock_abort(db, tx_id, e));
        }
        let frame_idx = match db.buffer_mgr().pin(tx_id, &block) {
            Ok(idx) => idx,
            Err(e) => {
                db.lock_mgr().release(tx_id, &block);
                return Err(Self::auto_rollback_on_lock_abort(db, tx_id, e));
            }
        };
        Ok(Self {
            db,
            tx_id,
            block,
            frame_idx,
            exclusive,
            released: false,
        })
    }

    /// Pin a block freshly allocated by the buffer pool (no lock needed:
    /// nobody else can know its id yet).
    pub fn open_new(db: &'a Database, tx_id: u32, file_name: &str) -> Result<Self, SmallError> {
        let (frame_idx, block) = match db.buffer_mgr().pin_new(tx_id, file_name) {
            Ok(v) => v,
            Err(e) => return Err(Self::auto_rollback_on_lock_abort(db, tx_id, e)),
        };
        Ok(Self {
            db,
            tx_id,
            block,
            frame_idx,
            exclusive: true,
            released: false,
        })
    }

    /// A `lock_abort` observed anywhere in this path rolls the
    /// transaction back automatically before it is re-raised to the
    /// caller (spec §7); any other error kind (e.g. `buffer_abort`)
    /// passes through unchanged, since the spec leaves rollback to the
    /// caller for those.
    fn auto_rollback_on_lock_abort(db: &Database, tx_id: u32, err: SmallError) -> SmallError {
        if err.kind() == Kind::LockAbort {
            if let Err(abort_err) = db.abort_tx(tx_id) {
                error!("tx {} auto-rollback after lock_abort itself failed: {}", tx_id, abort_err);
            }
        }
        err
    }

    pub fn block(&self) -> &BlockId {
        &self.block
    }

    pub fn db(&self) -> &'a Database {
        self.db
    }

    pub fn tx_id(&self) -> u32 {
        self.tx_id
    }

    pub fn read(&self) -> Vec<u8> {
        self.db.buffer_mgr().pool().with_contents(self.frame_idx, |c| c.to_vec())
    }

    pub fn write(&self, bytes: &[u8]) {
        self.db
            .buffer_mgr()
            .pool()
            .with_contents_mut(self.frame_idx, self.tx_id, |c| c.copy_from_slice(bytes));
    }

    pub fn is_exclusive(&self) -> bool {
        self.exclusive
    }

    /// Release the lock and the pin. Safe to call more than once.
    pub fn release(&mut self) -> SmallResult {
        if self.released {
            return Ok(());
        }
        self.db.buffer_mgr().unpin(self.tx_id, &self.block);
        self.db.lock_mgr().release(self.tx_id, &self.block);
        self.released = true;
        Ok(())
    }
}

impl<'a> Drop for PinnedPage<'a> {
    fn drop(&mut self) {
        let _ = self.release();
    }
}
