//! The buffer pool (spec §4.1, component C2): a fixed number of frames
//! shared by every transaction. `pin`/`pin_new` are single, non-blocking
//! attempts — waiting for a frame to come free, and the fairness policy
//! that governs who gets to retry first, live one level up in
//! [`TxBufferMgr`](crate::buffer::tx_buffer_mgr::TxBufferMgr) (spec §4.2
//! steps 3-4), since fairness is a property of the set of waiting
//! transactions, not of the pool itself.
//!
//! Grounded on the teacher's `Unique`/`Database` process-wide singleton
//! pattern (`src/utils.rs`, `src/common/database.rs`) for how a single
//! shared structure is owned behind a lock, but the pin/replacement
//! algorithm itself has no counterpart in the teacher (whose
//! `PageCache` never evicts) — it follows spec §4.1/§4.2 directly:
//! `BufferMgr.BUFFER_POOL_SIZE` frames, `BufferMgr.MAX_TIME` wait
//! timeout, `BufferMgr.EPSILON` wait-deadline slack.

use std::{
    sync::{Condvar, Mutex},
    time::Duration,
};

use log::debug;

use crate::{block_id::BlockId, buffer::frame::Frame, error::SmallError, file_mgr::FileMgr, types::SmallResult};

pub const DEFAULT_MAX_TIME: Duration = Duration::from_secs(10);
pub const DEFAULT_EPSILON: Duration = Duration::from_millis(50);

struct PoolState {
    frames: Vec<Frame>,
}

pub struct BufferPool {
    file_mgr: FileMgr,
    max_time: Duration,
    epsilon: Duration,
    state: Mutex<PoolState>,
    cond: Condvar,
}

impl BufferPool {
    pub fn new(file_mgr: FileMgr, num_buffers: usize, max_time: Duration, epsilon: Duration) -> Self {
        let frames: Vec<Frame> = (0..num_buffers)
            .map(|_| Frame::new(crate::file_mgr::BLOCK_SIZE))
            .collect();
        Self {
            file_mgr,
            max_time,
            epsilon,
            state: Mutex::new(PoolState { frames }),
            cond: Condvar::new(),
        }
    }

    pub fn num_buffers(&self) -> usize {
        self.state.lock().unwrap().frames.len()
    }

    pub fn max_time(&self) -> Duration {
        self.max_time
    }

    /// Slack added to a waiter's deadline (spec §4.2 step 4: stop
    /// waiting once `now - t0 + epsilon >= MAX_TIME`), not a pool
    /// replacement concept — the pool itself has no notion of idle
    /// frames.
    pub fn epsilon(&self) -> Duration {
        self.epsilon
    }

    /// Block the caller on the pool's condition variable for up to
    /// `timeout`, waking early if any frame is unpinned in the meantime.
    /// Used by [`TxBufferMgr`](crate::buffer::tx_buffer_mgr::TxBufferMgr)
    /// both for its per-pin wait loop and for re-pin recovery (spec
    /// §4.2.1 step 3) to give other transactions a scheduling window.
    pub fn wait_for_signal(&self, timeout: Duration) {
        let state = self.state.lock().unwrap();
        let _ = self.cond.wait_timeout(state, timeout).unwrap();
    }

    /// Wake every thread blocked in [`wait_for_signal`](Self::wait_for_signal).
    pub fn notify_all(&self) {
        let _state = self.state.lock().unwrap();
        self.cond.notify_all();
    }

    pub fn available(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .frames
            .iter()
            .filter(|f| !f.is_pinned())
            .count()
    }

    /// A single, non-blocking attempt to pin `block` (spec §4.1 "pin"):
    /// bump the pin count if it is already resident, otherwise claim any
    /// unpinned frame and read the block into it. Returns `Ok(None)`
    /// ("absent") if every frame is currently pinned; waiting is the
    /// caller's responsibility (spec §4.2).
    pub fn pin(&self, block: &BlockId) -> Result<Option<usize>, SmallError> {
        let mut state = self.state.lock().unwrap();
        if let Some(idx) = state.frames.iter().position(|f| f.block() == Some(block)) {
            state.frames[idx].pin();
            return Ok(Some(idx));
        }
        if let Some(idx) = Self::choose_unpinned(&state) {
            state.frames[idx].assign_to_block(block.clone(), &self.file_mgr)?;
            state.frames[idx].pin();
            debug!("pinned {} in frame {}", block, idx);
            return Ok(Some(idx));
        }
        Ok(None)
    }

    /// Allocate a new block at the end of `file_name` (spec §4.1
    /// "pin_new" step 1). Always touches the file manager, never the
    /// pool, so retrying the frame-acquisition half after this doesn't
    /// append a second block.
    pub fn allocate_block(&self, file_name: &str) -> Result<BlockId, SmallError> {
        self.file_mgr.append(file_name)
    }

    /// A single, non-blocking attempt to assign a frame to `block`,
    /// which must have just come back from
    /// [`allocate_block`](Self::allocate_block): its on-disk contents are
    /// known-zero, so this skips the read an ordinary
    /// [`pin`](Self::pin) would do. Returns `Ok(None)` if every frame is
    /// pinned.
    pub fn pin_new_frame(&self, block: &BlockId) -> Result<Option<usize>, SmallError> {
        let mut state = self.state.lock().unwrap();
        if let Some(idx) = Self::choose_unpinned(&state) {
            state.frames[idx].assign_to_new_block(block.clone(), &self.file_mgr)?;
            state.frames[idx].pin();
            debug!("pinned new block {} in frame {}", block, idx);
            return Ok(Some(idx));
        }
        Ok(None)
    }

    pub fn unpin(&self, idx: usize) {
        let mut state = self.state.lock().unwrap();
        state.frames[idx].unpin();
        if !state.frames[idx].is_pinned() {
            self.cond.notify_all();
        }
    }

    pub fn with_contents<T>(&self, idx: usize, f: impl FnOnce(&[u8]) -> T) -> T {
        let state = self.state.lock().unwrap();
        f(state.frames[idx].contents())
    }

    pub fn with_contents_mut<T>(&self, idx: usize, tx_id: u32, f: impl FnOnce(&mut [u8]) -> T) -> T {
        let mut state = self.state.lock().unwrap();
        state.frames[idx].set_modified(tx_id);
        f(state.frames[idx].contents_mut())
    }

    pub fn block_at(&self, idx: usize) -> Option<BlockId> {
        self.state.lock().unwrap().frames[idx].block().copied()
    }

    pub fn flush_all(&self, tx_id: u32) -> SmallResult {
        let mut state = self.state.lock().unwrap();
        for frame in state.frames.iter_mut() {
            if frame.modifying_tx() == Some(tx_id) {
                frame.flush(&self.file_mgr)?;
            }
        }
        Ok(())
    }

    fn choose_unpinned(state: &PoolState) -> Option<usize> {
        state.frames.iter().position(|f| !f.is_pinned())
    }
}
