//! Insert scenarios from spec §8: splitting a full leaf, promoting a
//! new root once the root directory itself splits, and chaining an
//! overflow block for a key repeated past one leaf's capacity.

mod test_utils;

use rand::seq::SliceRandom;

use crabtree::{
    btree::{
        page::{PageKind, SlottedBuf},
        BTreeIndex,
    },
    value::{Constant, ConstantRange, Type},
};
use test_utils::{new_int_index, rid_for, test_db};

fn drain(index: &BTreeIndex, db: &crabtree::database::Database, tx_id: u32) -> Vec<(Constant, u32)> {
    let mut cursor = index.open_cursor(db, tx_id);
    cursor.before_first(ConstantRange::unbounded()).unwrap();
    let mut out = Vec::new();
    while let Some((key, rid)) = cursor.next().unwrap() {
        out.push((key, rid.slot()));
    }
    cursor.close().unwrap();
    out
}

#[test]
fn insert_past_leaf_capacity_splits_and_stays_sorted() {
    let db = test_db();
    let index = new_int_index(&db, 1, "emp_id");

    let leaf_cap = SlottedBuf::empty(Type::Int, crabtree::btree::consts::LEAF_PAYLOAD_SIZE, PageKind::Leaf).capacity();
    let n = leaf_cap as u32 * 3 + 7;
    for i in (0..n).rev() {
        index.insert(&db, 1, &Constant::Int(i as i32), rid_for(i), true).unwrap();
    }

    let rows = drain(&index, &db, 1);
    assert_eq!(rows.len(), n as usize);
    for w in rows.windows(2) {
        assert!(w[0].0 < w[1].0, "scan must come back in sorted key order");
    }
}

#[test]
fn inserting_enough_distinct_keys_promotes_a_new_root() {
    let db = test_db();
    let index = new_int_index(&db, 1, "emp_id");

    let dir_cap = SlottedBuf::empty(Type::Int, crabtree::btree::consts::DIR_PAYLOAD_SIZE, PageKind::Directory).capacity();
    let leaf_cap = SlottedBuf::empty(Type::Int, crabtree::btree::consts::LEAF_PAYLOAD_SIZE, PageKind::Leaf).capacity();

    // enough distinct keys to split leaves past what one root directory
    // page can hold as children, forcing make_new_root (spec §4.6).
    let n = (leaf_cap * (dir_cap + 2)) as u32;
    for i in 0..n {
        index.insert(&db, 1, &Constant::Int(i as i32), rid_for(i), true).unwrap();
    }

    let rows = drain(&index, &db, 1);
    assert_eq!(rows.len(), n as usize);
    assert_eq!(rows.first().unwrap().0, Constant::Int(0));
    assert_eq!(rows.last().unwrap().0, Constant::Int(n as i32 - 1));
}

#[test]
fn repeated_key_past_capacity_chains_an_overflow_block_and_all_rids_scan_back() {
    let db = test_db();
    let index = new_int_index(&db, 1, "emp_id");

    let leaf_cap = SlottedBuf::empty(Type::Int, crabtree::btree::consts::LEAF_PAYLOAD_SIZE, PageKind::Leaf).capacity();
    let n = leaf_cap as u32 * 2 + 3;
    for i in 0..n {
        index.insert(&db, 1, &Constant::Int(7), rid_for(i), true).unwrap();
    }

    let mut cursor = index.open_cursor(&db, 1);
    cursor.before_first(ConstantRange::single(Constant::Int(7))).unwrap();
    let mut slots: Vec<u32> = Vec::new();
    while let Some((key, rid)) = cursor.next().unwrap() {
        assert_eq!(key, Constant::Int(7));
        slots.push(rid.slot());
    }
    cursor.close().unwrap();

    slots.sort_unstable();
    let expected: Vec<u32> = (0..n).collect();
    assert_eq!(slots, expected, "every repeated-key rid must survive the overflow chain");
}

#[test]
fn insert_in_random_order_still_scans_back_sorted() {
    let db = test_db();
    let index = new_int_index(&db, 1, "emp_id");

    let leaf_cap = SlottedBuf::empty(Type::Int, crabtree::btree::consts::LEAF_PAYLOAD_SIZE, PageKind::Leaf).capacity();
    let n = leaf_cap as u32 * 5;
    let mut order: Vec<u32> = (0..n).collect();
    order.shuffle(&mut rand::thread_rng());

    for &i in &order {
        index.insert(&db, 1, &Constant::Int(i as i32), rid_for(i), true).unwrap();
    }

    let rows = drain(&index, &db, 1);
    assert_eq!(rows.len(), n as usize);
    for (slot, (key, rid)) in rows.iter().enumerate() {
        assert_eq!(*key, Constant::Int(slot as i32));
        assert_eq!(*rid, slot as u32);
    }
}
