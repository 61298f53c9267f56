//! Shared fixtures for the integration tests, mirroring the teacher's
//! own `tests/test_utils` split (`setup`, table/tree constructors).

use std::sync::atomic::{AtomicU32, Ordering};

use crabtree::{block_id::BlockId, btree::BTreeIndex, config::Config, database::Database, rid::Rid, value::Type};

static TEST_SEQ: AtomicU32 = AtomicU32::new(0);

/// Initialize logging once per test binary, as the teacher's own
/// `tests/test_utils::setup()` does.
pub fn setup() {
    crabtree::init_log();
}

/// A fresh, scratch-directory `Database` with a small buffer pool so
/// pool-exhaustion / starvation scenarios are reachable without
/// thousands of blocks (spec §8 "testable properties" calibrates pool
/// size for testability the same way).
pub fn test_db_with_pool(pool_size: usize) -> Database {
    setup();
    let n = TEST_SEQ.fetch_add(1, Ordering::SeqCst);
    let dir = std::env::temp_dir().join(format!("crabtree-it-{}-{}", std::process::id(), n));
    let _ = std::fs::remove_dir_all(&dir);
    let mut config = Config::default();
    config.buffer_pool_size = pool_size;
    Database::new(dir, config).unwrap()
}

pub fn test_db() -> Database {
    test_db_with_pool(64)
}

/// Create a brand-new integer-keyed index over a (nonexistent, never
/// touched) data file, using `tx_id` to perform the creation writes.
pub fn new_int_index(db: &Database, tx_id: u32, name: &str) -> BTreeIndex {
    BTreeIndex::create(db, tx_id, name, "emp.tbl", Type::Int).unwrap()
}

/// A distinct RID for the i-th inserted row, all pointing into a single
/// data block — the index never dereferences these, it only stores and
/// compares them, so one data block number is enough fixture fidelity.
pub fn rid_for(i: u32) -> Rid {
    Rid::new(BlockId::new("emp.tbl", 0), i)
}
