//! A polymorphic index capability, so callers that only need
//! `insert`/`delete`/range-scan don't need to name `BTreeIndex` or
//! `BTreeIndexCursor` directly. Supplements spec.md (Design Note
//! "Polymorphic index"): the crabbing B-tree is, for now, the only
//! implementation, but giving the capability a trait seam matches how
//! the teacher separates a concrete structure (`BTreeTable`) from the
//! operators that drive it (`BTreeTableSearchIterator`, `SequentialScan`)
//! through a shared iterator shape.

use crate::{
    btree::{BTreeIndex, BTreeIndexCursor},
    database::Database,
    error::SmallError,
    rid::Rid,
    types::SmallResult,
    value::{Constant, ConstantRange},
};

/// The cursor capability a caller holding only `&dyn Index` needs to
/// fully drive a range scan, without downcasting to the concrete B-tree
/// cursor type.
pub trait IndexCursor<'a> {
    fn before_first(&mut self, range: ConstantRange) -> SmallResult;
    fn next(&mut self) -> Result<Option<(Constant, Rid)>, SmallError>;
    fn get_data_rid(&self) -> Option<Rid>;
    fn close(self: Box<Self>) -> SmallResult;
}

impl<'a> IndexCursor<'a> for BTreeIndexCursor<'a> {
    fn before_first(&mut self, range: ConstantRange) -> SmallResult {
        BTreeIndexCursor::before_first(self, range)
    }

    fn next(&mut self) -> Result<Option<(Constant, Rid)>, SmallError> {
        BTreeIndexCursor::next(self)
    }

    fn get_data_rid(&self) -> Option<Rid> {
        BTreeIndexCursor::get_data_rid(self)
    }

    fn close(self: Box<Self>) -> SmallResult {
        BTreeIndexCursor::close(*self)
    }
}

pub trait Index {
    fn name(&self) -> &str;
    fn insert(&self, db: &Database, tx_id: u32, key: &Constant, rid: Rid, do_logical_logging: bool) -> SmallResult;
    fn delete(&self, db: &Database, tx_id: u32, key: &Constant, rid: &Rid, do_logical_logging: bool) -> SmallResult;
    fn estimate_io_cost(&self, total_records: usize, matching_records: usize) -> usize;

    /// Pin every leaf and directory block into the buffer pool once, up
    /// front (spec §11 "pre_load_to_memory").
    fn pre_load_to_memory(&self, db: &Database, tx_id: u32) -> SmallResult;

    /// A cursor over this index, boxed so a caller holding only `&dyn
    /// Index` can drive a full scan (`before_first`/`next`/
    /// `get_data_rid`/`close`) without naming the concrete index type.
    fn open_cursor<'a>(&'a self, db: &'a Database, tx_id: u32) -> Box<dyn IndexCursor<'a> + 'a>;
}

impl Index for BTreeIndex {
    fn name(&self) -> &str {
        BTreeIndex::name(self)
    }

    fn insert(&self, db: &Database, tx_id: u32, key: &Constant, rid: Rid, do_logical_logging: bool) -> SmallResult {
        BTreeIndex::insert(self, db, tx_id, key, rid, do_logical_logging)
    }

    fn delete(&self, db: &Database, tx_id: u32, key: &Constant, rid: &Rid, do_logical_logging: bool) -> SmallResult {
        BTreeIndex::delete(self, db, tx_id, key, rid, do_logical_logging)
    }

    fn estimate_io_cost(&self, total_records: usize, matching_records: usize) -> usize {
        BTreeIndex::estimate_io_cost(self, total_records, matching_records)
    }

    fn pre_load_to_memory(&self, db: &Database, tx_id: u32) -> SmallResult {
        BTreeIndex::pre_load_to_memory(self, db, tx_id)
    }

    fn open_cursor<'a>(&'a self, db: &'a Database, tx_id: u32) -> Box<dyn IndexCursor<'a> + 'a> {
        Box::new(BTreeIndex::open_cursor(self, db, tx_id))
    }
}

/// A tagged union over the concrete index implementations this crate
/// ships. Kept alongside the `Index` trait rather than used instead of
/// it: callers that need `dyn`-free dispatch (e.g. a catalog keyed by
/// index name) can match on the tag, while callers that just need the
/// capability can take `&dyn Index`.
pub enum IndexKind {
    BTree(BTreeIndex),
}

impl IndexKind {
    pub fn open_cursor<'a>(&'a self, db: &'a Database, tx_id: u32) -> BTreeIndexCursor<'a> {
        match self {
            IndexKind::BTree(index) => index.open_cursor(db, tx_id),
        }
    }

    pub fn as_index(&self) -> &dyn Index {
        match self {
            IndexKind::BTree(index) => index,
        }
    }
}

/// Convenience used by cursor-driving callers to scan a range without
/// naming `BTreeIndexCursor` directly.
pub fn scan_range<'a>(
    index: &'a IndexKind,
    db: &'a Database,
    tx_id: u32,
    range: ConstantRange,
) -> Result<BTreeIndexCursor<'a>, SmallError> {
    let mut cursor = index.open_cursor(db, tx_id);
    cursor.before_first(range)?;
    Ok(cursor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{block_id::BlockId, config::Config, value::Type};

    fn test_db(tag: &str) -> Database {
        let dir = std::env::temp_dir().join(format!("crabtree-index-api-test-{}-{}", std::process::id(), tag));
        let _ = std::fs::remove_dir_all(&dir);
        Database::new(dir, Config::default()).unwrap()
    }

    #[test]
    fn dyn_index_can_fully_drive_a_scan_without_naming_btree_types() {
        let db = test_db("scan");
        let index = BTreeIndex::create(&db, 1, "emp_id", "emp.tbl", Type::Int).unwrap();
        let dyn_index: &dyn Index = &index;

        for i in 0..5 {
            dyn_index
                .insert(&db, 1, &Constant::Int(i), Rid::new(BlockId::new("emp.tbl", 0), i as u32), true)
                .unwrap();
        }

        dyn_index.pre_load_to_memory(&db, 1).unwrap();

        let mut cursor = dyn_index.open_cursor(&db, 1);
        cursor.before_first(ConstantRange::unbounded()).unwrap();
        let mut seen = Vec::new();
        while let Some((key, _rid)) = cursor.next().unwrap() {
            seen.push(key);
        }
        assert_eq!(seen, vec![Constant::Int(0), Constant::Int(1), Constant::Int(2), Constant::Int(3), Constant::Int(4)]);
        cursor.close().unwrap();
    }
}
