//! A crabbing B-tree secondary index engine over a pinned-page
//! transactional buffer manager.
//!
//! The buffer manager (`buffer`) and lock manager (`concurrency`) are
//! generic collaborators any storage structure could use; the B-tree
//! (`btree`) is the one structure this crate builds on top of them.
//! `database::Database` is the process-wide registry tying a
//! transaction to the collaborators it needs.

pub mod block_id;
pub mod btree;
pub mod buffer;
pub mod concurrency;
pub mod config;
pub mod database;
pub mod error;
pub mod file_mgr;
pub mod index_api;
pub mod io;
pub mod recovery;
pub mod rid;
pub mod transaction;
pub mod types;
pub mod value;

use std::sync::Once;

static LOG_INIT: Once = Once::new();

/// Initialize the `env_logger` backend exactly once per process. Safe
/// to call from every test; subsequent calls are no-ops.
pub fn init_log() {
    LOG_INIT.call_once(|| {
        env_logger::builder().is_test(true).try_init().ok();
    });
}
