//! The transaction context (spec §4.3 "Transaction lifecycle hooks"):
//! identifies one logical unit of work to the buffer manager, lock
//! manager, and recovery manager, and drives their commit/rollback
//! hooks.
//!
//! Grounded on the teacher's `transaction::tx::Transaction` (same atomic
//! id counter, same `start`/`commit`/`abort` lifecycle calling into the
//! log manager), generalized to also drive the lock manager's
//! `release_all` and the transactional buffer manager's `commit`/
//! `release_all`, which the teacher's single-process `PageCache` handled
//! implicitly by discarding or flushing whatever it found dirty.

use std::{
    fmt,
    sync::atomic::{AtomicU32, Ordering},
};

use crate::{database::Database, error::SmallError, types::SmallResult};

static NEXT_TRANSACTION_ID: AtomicU32 = AtomicU32::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Active,
    Committed,
    Aborted,
}

pub struct Transaction {
    id: u32,
    read_only: bool,
    status: TransactionStatus,
}

impl Transaction {
    /// Begin a new transaction and record its `logical_start` marker.
    pub fn start(db: &Database, read_only: bool) -> Result<Self, SmallError> {
        let id = NEXT_TRANSACTION_ID.fetch_add(1, Ordering::SeqCst);
        db.recovery_mgr().logical_start(id)?;
        if read_only {
            db.mark_read_only(id);
        }
        Ok(Self {
            id,
            read_only,
            status: TransactionStatus::Active,
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    /// Reject a write attempted on a read-only transaction (spec §7,
    /// `unsupported_operation`).
    pub fn require_writable(&self) -> SmallResult {
        if self.read_only {
            return Err(SmallError::unsupported_operation(&format!(
                "transaction {} is read-only",
                self.id
            )));
        }
        Ok(())
    }

    /// Flush every page this transaction dirtied, release its locks and
    /// pins, and record the commit marker.
    pub fn commit(&mut self, db: &Database) -> SmallResult {
        db.buffer_mgr().commit(self.id)?;
        db.lock_mgr().release_all(self.id);
        db.recovery_mgr().commit(self.id)?;
        db.forget_tx(self.id);
        self.status = TransactionStatus::Committed;
        Ok(())
    }

    /// Discard every page this transaction dirtied without flushing,
    /// release its locks and pins, and record the abort marker. A no-op
    /// if this transaction was already rolled back automatically (spec
    /// §7) after a `lock_abort` surfaced from the B-tree/pinned-page
    /// path.
    pub fn abort(&mut self, db: &Database) -> SmallResult {
        db.abort_tx(self.id)?;
        db.forget_tx(self.id);
        self.status = TransactionStatus::Aborted;
        Ok(())
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<Transaction {} {:?}>", self.id, self.status)
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}
