//! Unit tests for the row store.

use crate::helpers::people_columns;
use gridstore::data::{minimum_floor, RowStore};
use gridstore::{CellValue, GridError};

fn store(minimum: usize) -> RowStore {
    let store = RowStore::new();
    store.initialize(people_columns(), minimum).unwrap();
    store
}

#[test]
fn test_uninitialized_store() {
    let store = RowStore::new();
    assert!(!store.is_initialized());
    assert!(matches!(store.snapshot(), Err(GridError::NotInitialized)));
    assert!(matches!(store.get(0), Err(GridError::NotInitialized)));
    assert!(!store.state().is_initialized);
}

#[test]
fn test_snapshot_is_point_in_time() {
    let store = store(0);
    store
        .write_rows(|w| {
            w.push(vec![CellValue::from("a"), CellValue::Number(1.0)]);
            w.push(vec![CellValue::from("b"), CellValue::Number(2.0)]);
        })
        .unwrap();

    let snapshot = store.snapshot().unwrap();
    store
        .write_rows(|w| {
            w.remove(0);
            w.set(0, vec![CellValue::from("changed")]).unwrap();
        })
        .unwrap();

    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot.rows[0].cells[0], CellValue::from("a"));
    assert_eq!(snapshot.rows[1].cells[0], CellValue::from("b"));
    assert_eq!(store.row_count(), 1);
    assert!(store.generation() > snapshot.generation);
}

#[test]
fn test_set_keeps_row_id() {
    let store = store(0);
    store
        .write_rows(|w| {
            w.push_empty();
            w.push_empty();
        })
        .unwrap();
    let (before, _) = store.get(1).unwrap();

    store
        .write_rows(|w| w.set(1, vec![CellValue::from("x"), CellValue::Number(9.0)]))
        .unwrap()
        .unwrap();

    let (after, _) = store.get(1).unwrap();
    assert_eq!(before.id, after.id);
    assert_eq!(after.cells[1], CellValue::Number(9.0));
}

#[test]
fn test_out_of_range_accessors() {
    let store = store(0);
    assert!(matches!(
        store.get(3),
        Err(GridError::NotFound {
            index: 3,
            row_count: 0
        })
    ));
    let result = store.write_rows(|w| w.set(0, vec![])).unwrap();
    assert!(matches!(result, Err(GridError::NotFound { .. })));
}

#[test]
fn test_range_clamps_to_row_count() {
    let store = store(0);
    store
        .write_rows(|w| {
            for i in 0..5 {
                w.push(vec![CellValue::from(format!("r{}", i))]);
            }
        })
        .unwrap();

    let window = store.range(3, 10).unwrap();
    assert_eq!(window.len(), 2);
    assert_eq!(window.rows[0].cells[0], CellValue::from("r3"));
    assert!(store.range(8, 2).unwrap().is_empty());
}

#[test]
fn test_ensure_minimum_and_state() {
    let store = store(4);
    store.write_rows(|w| w.ensure_minimum()).unwrap();

    let state = store.state();
    assert!(state.is_initialized);
    assert_eq!(state.row_count, minimum_floor(4));
    assert_eq!(state.columns, vec!["Name".to_string(), "Age".to_string()]);
    assert_eq!(state.minimum_row_count, 4);
    assert!(state.last_modified.is_some());
}

#[test]
fn test_short_rows_are_padded() {
    let store = store(0);
    store
        .write_rows(|w| w.push(vec![CellValue::from("only name")]))
        .unwrap();
    let (row, _) = store.get(0).unwrap();
    assert_eq!(row.cells.len(), 2);
    assert_eq!(row.cells[1], CellValue::Empty);
}
