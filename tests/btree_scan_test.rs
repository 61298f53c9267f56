//! Range-scan scenarios from spec §8: bounded/unbounded cursors,
//! inclusive/exclusive endpoints, and the invalid-range (`lo > hi`)
//! silent-empty behavior spec §6/§7 calls for.

mod test_utils;

use crabtree::value::{Constant, ConstantRange};
use test_utils::{new_int_index, rid_for, test_db};

fn populate(index: &crabtree::btree::BTreeIndex, db: &crabtree::database::Database, n: u32) {
    for i in 0..n {
        index.insert(db, 1, &Constant::Int(i as i32), rid_for(i), true).unwrap();
    }
}

#[test]
fn unbounded_scan_returns_every_row_in_order() {
    let db = test_db();
    let index = new_int_index(&db, 1, "emp_id");
    populate(&index, &db, 500);

    let mut cursor = index.open_cursor(&db, 1);
    cursor.before_first(ConstantRange::unbounded()).unwrap();
    let mut count = 0;
    let mut prev: Option<Constant> = None;
    while let Some((key, _)) = cursor.next().unwrap() {
        if let Some(p) = &prev {
            assert!(p < &key);
        }
        prev = Some(key);
        count += 1;
    }
    cursor.close().unwrap();
    assert_eq!(count, 500);
}

#[test]
fn bounded_range_respects_inclusive_and_exclusive_endpoints() {
    let db = test_db();
    let index = new_int_index(&db, 1, "emp_id");
    populate(&index, &db, 100);

    let range = ConstantRange::new(Some(Constant::Int(10)), Some(Constant::Int(20)), true, false);
    let mut cursor = index.open_cursor(&db, 1);
    cursor.before_first(range).unwrap();
    let mut keys = Vec::new();
    while let Some((key, _)) = cursor.next().unwrap() {
        keys.push(key);
    }
    cursor.close().unwrap();

    let expected: Vec<Constant> = (10..20).map(Constant::Int).collect();
    assert_eq!(keys, expected, "[10, 20) must include 10 and exclude 20");
}

#[test]
fn invalid_range_yields_no_rows_without_erroring() {
    let db = test_db();
    let index = new_int_index(&db, 1, "emp_id");
    populate(&index, &db, 20);

    let backwards = ConstantRange::new(Some(Constant::Int(15)), Some(Constant::Int(5)), true, true);
    let mut cursor = index.open_cursor(&db, 1);
    cursor.before_first(backwards).unwrap();
    assert!(cursor.next().unwrap().is_none());
    cursor.close().unwrap();
}

#[test]
fn single_key_range_matches_exactly_that_key() {
    let db = test_db();
    let index = new_int_index(&db, 1, "emp_id");
    populate(&index, &db, 50);

    let mut cursor = index.open_cursor(&db, 1);
    cursor.before_first(ConstantRange::single(Constant::Int(33))).unwrap();
    let (key, rid) = cursor.next().unwrap().unwrap();
    assert_eq!(key, Constant::Int(33));
    assert_eq!(rid.slot(), 33);
    assert!(cursor.next().unwrap().is_none());
    cursor.close().unwrap();
}
