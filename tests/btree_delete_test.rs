//! Delete scenarios from spec §8: deleting a full population back out in
//! reverse insertion order, deleting from within an overflow chain, and
//! the silent no-op for a key that was never there.

mod test_utils;

use crabtree::value::{Constant, ConstantRange};
use test_utils::{new_int_index, rid_for, test_db};

#[test]
fn deleting_every_row_in_reverse_order_leaves_the_index_empty() {
    let db = test_db();
    let index = new_int_index(&db, 1, "emp_id");

    let n = 200u32;
    for i in 0..n {
        index.insert(&db, 1, &Constant::Int(i as i32), rid_for(i), true).unwrap();
    }
    for i in (0..n).rev() {
        index.delete(&db, 1, &Constant::Int(i as i32), &rid_for(i), true).unwrap();
    }

    let mut cursor = index.open_cursor(&db, 1);
    cursor.before_first(ConstantRange::unbounded()).unwrap();
    assert!(cursor.next().unwrap().is_none(), "index must be empty after deleting every row");
    cursor.close().unwrap();
}

#[test]
fn deleting_one_rid_of_a_repeated_key_leaves_the_rest() {
    let db = test_db();
    let index = new_int_index(&db, 1, "emp_id");

    for i in 0..30u32 {
        index.insert(&db, 1, &Constant::Int(9), rid_for(i), true).unwrap();
    }
    index.delete(&db, 1, &Constant::Int(9), &rid_for(15), true).unwrap();

    let mut cursor = index.open_cursor(&db, 1);
    cursor.before_first(ConstantRange::single(Constant::Int(9))).unwrap();
    let mut slots: Vec<u32> = Vec::new();
    while let Some((_, rid)) = cursor.next().unwrap() {
        slots.push(rid.slot());
    }
    cursor.close().unwrap();

    slots.sort_unstable();
    let expected: Vec<u32> = (0..30u32).filter(|&i| i != 15).collect();
    assert_eq!(slots, expected);
}

#[test]
fn deleting_an_absent_key_is_a_silent_no_op() {
    let db = test_db();
    let index = new_int_index(&db, 1, "emp_id");

    index.insert(&db, 1, &Constant::Int(1), rid_for(0), true).unwrap();
    index.delete(&db, 1, &Constant::Int(999), &rid_for(0), true).unwrap();
    index.delete(&db, 1, &Constant::Int(1), &rid_for(42), true).unwrap();

    let mut cursor = index.open_cursor(&db, 1);
    cursor.before_first(ConstantRange::unbounded()).unwrap();
    let (key, rid) = cursor.next().unwrap().unwrap();
    assert_eq!(key, Constant::Int(1));
    assert_eq!(rid.slot(), 0);
    assert!(cursor.next().unwrap().is_none());
    cursor.close().unwrap();
}
