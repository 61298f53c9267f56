//! The process-wide collaborator registry: owns the buffer manager, lock
//! manager, and recovery manager, and is how a `Transaction` or
//! `BTreeIndex` reaches them.
//!
//! Grounded on the teacher's `common::database::Database` singleton
//! (`path`, `buffer_pool`, `concurrent_status`, `log_manager` fields,
//! `global()` accessor via `static mut` + `std::sync::Once`), trimmed of
//! the catalog/schema machinery this crate has no use for (spec's
//! Non-goals exclude the surrounding relational layer) and renamed
//! fields to this crate's collaborator names.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    sync::{Mutex, Once},
};

use crate::{
    buffer::{BufferPool, TxBufferMgr},
    concurrency::LockMgr,
    config::Config,
    error::SmallError,
    file_mgr::FileMgr,
    recovery::RecoveryManager,
    types::SmallResult,
};

pub struct Database {
    dir_path: PathBuf,
    config: Config,
    buffer_mgr: TxBufferMgr,
    lock_mgr: LockMgr,
    recovery_mgr: RecoveryManager,
    read_only_txs: Mutex<HashSet<u32>>,
    aborted_txs: Mutex<HashSet<u32>>,
}

impl Database {
    pub fn new<P: AsRef<Path>>(dir_path: P, config: Config) -> Result<Self, SmallError> {
        let dir_path = dir_path.as_ref().to_path_buf();
        let file_mgr = FileMgr::new(&dir_path);
        let pool = BufferPool::new(file_mgr, config.buffer_pool_size, config.max_time, config.epsilon);
        let buffer_mgr = TxBufferMgr::new(pool);
        let lock_mgr = LockMgr::new(config.lock_timeout);
        let recovery_mgr = RecoveryManager::new(dir_path.join("recovery.log"))?;
        Ok(Self {
            dir_path,
            config,
            buffer_mgr,
            lock_mgr,
            recovery_mgr,
            read_only_txs: Mutex::new(HashSet::new()),
            aborted_txs: Mutex::new(HashSet::new()),
        })
    }

    /// Record that `tx_id` is read-only, so writes routed through this
    /// database (spec §6/§7 `unsupported_operation`) can be rejected
    /// without threading a `Transaction` reference through every B-tree
    /// call. Mirrors the teacher's `Transaction::read_only` flag, but
    /// keyed by id here since the B-tree/buffer layers only ever carry a
    /// bare `tx_id` (spec §4 treats the transaction context as an
    /// external collaborator, not a value this core owns).
    pub fn mark_read_only(&self, tx_id: u32) {
        self.read_only_txs.lock().unwrap().insert(tx_id);
    }

    pub fn is_tx_read_only(&self, tx_id: u32) -> bool {
        self.read_only_txs.lock().unwrap().contains(&tx_id)
    }

    /// Forget a finished transaction's read-only marker (spec §4.3:
    /// lifecycle hooks are the only cleanup path).
    pub fn forget_tx(&self, tx_id: u32) {
        self.read_only_txs.lock().unwrap().remove(&tx_id);
        self.aborted_txs.lock().unwrap().remove(&tx_id);
    }

    /// Roll back `tx_id`: release its pins without flushing, release its
    /// locks, and record the abort marker (spec §7: "a `lock_abort`
    /// observed anywhere must roll the transaction back automatically
    /// before it is re-raised to the caller"). Idempotent, since both
    /// [`PinnedPage::open`](crate::btree::pinned_page::PinnedPage::open)
    /// (on an observed `lock_abort`) and `Transaction::abort` (on the
    /// caller's own initiative) may call this for the same transaction.
    pub fn abort_tx(&self, tx_id: u32) -> SmallResult {
        if !self.aborted_txs.lock().unwrap().insert(tx_id) {
            return Ok(());
        }
        self.buffer_mgr.release_all(tx_id);
        self.lock_mgr.release_all(tx_id);
        self.recovery_mgr.abort(tx_id)?;
        Ok(())
    }

    pub fn dir_path(&self) -> &Path {
        &self.dir_path
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn buffer_mgr(&self) -> &TxBufferMgr {
        &self.buffer_mgr
    }

    pub fn lock_mgr(&self) -> &LockMgr {
        &self.lock_mgr
    }

    pub fn recovery_mgr(&self) -> &RecoveryManager {
        &self.recovery_mgr
    }

    /// The process-wide instance, lazily created on first use from
    /// `CRABTREE_DB_DIR` (defaulting to `./data/crabtree_db`) and the
    /// environment-supplied `Config`. Mirrors the teacher's
    /// `Unique`/`Database::global()` pattern.
    pub fn global() -> &'static Database {
        static INIT: Once = Once::new();
        static mut SINGLETON: *const Database = std::ptr::null();

        unsafe {
            INIT.call_once(|| {
                let dir = std::env::var("CRABTREE_DB_DIR").unwrap_or_else(|_| "data/crabtree_db".to_string());
                let db = Database::new(dir, Config::from_env()).expect("failed to initialize database");
                SINGLETON = Box::into_raw(Box::new(db));
            });
            &*SINGLETON
        }
    }
}
