//! The concurrency (lock) manager: shared/exclusive locks on `BlockId`s,
//! with wait-for-graph cycle detection backing the "lock_abort" error
//! signal (spec §6/§7).
//!
//! Grounded on the teacher's `transaction::concurrent_status::ConcurrentStatus`
//! (`Lock::{SLock, XLock}`, `request_latch` polling loop, `TIMEOUT`) and
//! `transaction::wait_for_graph::WaitForGraph`, trimmed to the two
//! primitives the B-tree's crabbing protocol (spec §4.5 "Search with
//! crabbing") actually uses: acquire-shared, acquire-exclusive, release.

use std::{
    collections::{HashMap, HashSet},
    sync::{Condvar, Mutex},
    time::{Duration, Instant},
};

use crate::{block_id::BlockId, concurrency::wait_for_graph::WaitForGraph, error::SmallError};

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Default)]
struct LockTable {
    shared: HashMap<BlockId, HashSet<u32>>,
    exclusive: HashMap<BlockId, u32>,
    wait_for: WaitForGraph,
}

pub struct LockMgr {
    timeout: Duration,
    table: Mutex<LockTable>,
    cond: Condvar,
}

impl LockMgr {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            table: Mutex::new(LockTable::default()),
            cond: Condvar::new(),
        }
    }

    pub fn s_lock(&self, tx_id: u32, block: &BlockId) -> Result<(), SmallError> {
        self.acquire(tx_id, block, |table, tx_id, block| {
            if let Some(&holder) = table.exclusive.get(block) {
                if holder == tx_id {
                    return true;
                }
                return false;
            }
            true
        })?;
        let mut table = self.table.lock().unwrap();
        table.shared.entry(block.clone()).or_default().insert(tx_id);
        Ok(())
    }

    pub fn x_lock(&self, tx_id: u32, block: &BlockId) -> Result<(), SmallError> {
        self.acquire(tx_id, block, |table, tx_id, block| {
            let only_self_shared = table
                .shared
                .get(block)
                .map(|holders| holders.is_empty() || (holders.len() == 1 && holders.contains(&tx_id)))
                .unwrap_or(true);
            let exclusive_ok = table
                .exclusive
                .get(block)
                .map(|&holder| holder == tx_id)
                .unwrap_or(true);
            only_self_shared && exclusive_ok
        })?;
        let mut table = self.table.lock().unwrap();
        table.exclusive.insert(block.clone(), tx_id);
        Ok(())
    }

    fn acquire(
        &self,
        tx_id: u32,
        block: &BlockId,
        can_grant: impl Fn(&LockTable, u32, &BlockId) -> bool,
    ) -> Result<(), SmallError> {
        let start = Instant::now();
        let mut table = self.table.lock().unwrap();
        loop {
            if can_grant(&table, tx_id, block) {
                table.wait_for.remove_transaction(tx_id);
                return Ok(());
            }

            let holders = self.current_holders(&table, block, tx_id);
            for holder in &holders {
                table.wait_for.add_edge(tx_id, *holder);
            }
            if table.wait_for.exists_cycle() {
                for holder in &holders {
                    table.wait_for.remove_edge(tx_id, *holder);
                }
                return Err(SmallError::lock_abort(&format!(
                    "deadlock detected acquiring lock on {} for tx {}",
                    block, tx_id
                )));
            }

            let elapsed = start.elapsed();
            if elapsed >= self.timeout {
                table.wait_for.remove_transaction(tx_id);
                return Err(SmallError::lock_abort(&format!(
                    "timed out acquiring lock on {} for tx {}",
                    block, tx_id
                )));
            }
            let (guard, _) = self.cond.wait_timeout(table, self.timeout - elapsed).unwrap();
            table = guard;
        }
    }

    fn current_holders(&self, table: &LockTable, block: &BlockId, tx_id: u32) -> Vec<u32> {
        let mut holders = Vec::new();
        if let Some(&holder) = table.exclusive.get(block) {
            if holder != tx_id {
                holders.push(holder);
            }
        }
        if let Some(set) = table.shared.get(block) {
            holders.extend(set.iter().copied().filter(|&h| h != tx_id));
        }
        holders
    }

    pub fn release(&self, tx_id: u32, block: &BlockId) {
        let mut table = self.table.lock().unwrap();
        if let Some(set) = table.shared.get_mut(block) {
            set.remove(&tx_id);
        }
        if table.exclusive.get(block) == Some(&tx_id) {
            table.exclusive.remove(block);
        }
        self.cond.notify_all();
    }

    pub fn release_all(&self, tx_id: u32) {
        let mut table = self.table.lock().unwrap();
        for set in table.shared.values_mut() {
            set.remove(&tx_id);
        }
        table.exclusive.retain(|_, holder| *holder != tx_id);
        table.wait_for.remove_transaction(tx_id);
        self.cond.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_locks_are_compatible() {
        let mgr = LockMgr::new(Duration::from_millis(200));
        let blk = BlockId::new("t.idx", 0);
        mgr.s_lock(1, &blk).unwrap();
        mgr.s_lock(2, &blk).unwrap();
    }

    #[test]
    fn exclusive_excludes_shared() {
        let mgr = LockMgr::new(Duration::from_millis(200));
        let blk = BlockId::new("t.idx", 0);
        mgr.x_lock(1, &blk).unwrap();
        let err = mgr.s_lock(2, &blk).unwrap_err();
        assert_eq!(err.kind(), crate::error::Kind::LockAbort);
    }

    #[test]
    fn release_unblocks_waiter() {
        let mgr = LockMgr::new(Duration::from_secs(2));
        let blk = BlockId::new("t.idx", 0);
        mgr.x_lock(1, &blk).unwrap();
        mgr.release(1, &blk);
        mgr.x_lock(2, &blk).unwrap();
    }
}
