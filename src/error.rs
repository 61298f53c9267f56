use std::{error::Error, fmt};

use backtrace::Backtrace;

/// The taxonomy of failures that can surface at the public API of the
/// buffer manager / B-tree index (spec §7).
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Kind {
    /// Lock manager detected deadlock, or a request for a page never
    /// acquired its lock. Caller must roll back the transaction.
    LockAbort,

    /// This transaction's pin set would exceed the buffer pool size, or
    /// the wait for a free frame was interrupted. Fatal to the
    /// transaction.
    BufferAbort,

    /// A write call (`insert`/`delete`) was attempted on a read-only
    /// transaction.
    UnsupportedOperation,

    /// `before_first` was called with an invalid (`lo > hi`) range. Not
    /// actually raised as an error by this crate (the cursor silently
    /// yields no rows, per spec §6/§7) but kept in the taxonomy so
    /// callers that want to distinguish it from other causes can match
    /// on it if a collaborator chooses to surface it this way.
    InvalidRange,

    /// Propagated from the file manager.
    Io,
}

#[derive(Debug)]
pub struct SmallError {
    kind: Kind,
    details: String,
    backtrace: Backtrace,
}

impl SmallError {
    pub fn new(kind: Kind, msg: &str) -> SmallError {
        SmallError {
            kind,
            details: msg.to_string(),
            backtrace: Backtrace::new(),
        }
    }

    pub fn lock_abort(msg: &str) -> SmallError {
        Self::new(Kind::LockAbort, msg)
    }

    pub fn buffer_abort(msg: &str) -> SmallError {
        Self::new(Kind::BufferAbort, msg)
    }

    pub fn unsupported_operation(msg: &str) -> SmallError {
        Self::new(Kind::UnsupportedOperation, msg)
    }

    pub fn io(msg: &str) -> SmallError {
        Self::new(Kind::Io, msg)
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn show_backtrace(&self) {
        log::error!("{}\n{:?}", self.details, self.backtrace);
    }
}

impl fmt::Display for SmallError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{:?}] {}", self.kind, self.details)
    }
}

impl Error for SmallError {}

impl From<std::io::Error> for SmallError {
    fn from(e: std::io::Error) -> Self {
        SmallError::io(&e.to_string())
    }
}
