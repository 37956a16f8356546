//! Unit tests for smart delete.

use crate::helpers::{name_of, people, TestGridBuilder};
use gridstore::{CellValue, ExportOptions, GridError};

#[tokio::test]
async fn test_boundary_remove_then_clear() {
    // minimum 5 -> floor 6
    let engine = TestGridBuilder::new()
        .with_minimum_rows(5)
        .with_rows(people(7))
        .build()
        .await;
    assert_eq!(engine.row_count(), 7);

    let first = engine.smart_delete(&[0]).await.unwrap();
    assert_eq!(first.deleted_count, 1);
    assert_eq!(first.cleared_count, 0);
    assert_eq!(engine.row_count(), 6);

    let second = engine.smart_delete(&[0]).await.unwrap();
    assert_eq!(second.deleted_count, 0);
    assert_eq!(second.cleared_count, 1);
    assert_eq!(second.actual_count(), 1);
    assert_eq!(engine.row_count(), 6);
    assert!(engine.get_row(0).unwrap().is_empty());
}

#[tokio::test]
async fn test_descending_order_deletes_intended_rows() {
    let engine = TestGridBuilder::new().with_rows(people(8)).build().await;

    let result = engine.smart_delete(&[1, 3]).await.unwrap();
    assert_eq!(result.deleted_count, 2);

    let names: Vec<String> = engine
        .export(ExportOptions::default())
        .await
        .unwrap()
        .iter()
        .filter_map(|r| name_of(r).map(str::to_string))
        .collect();
    assert_eq!(names, vec!["p0", "p2", "p4", "p5", "p6", "p7"]);
}

#[tokio::test]
async fn test_out_of_range_and_duplicates() {
    let engine = TestGridBuilder::new().with_rows(people(5)).build().await;

    let result = engine.smart_delete(&[2, 2, 40]).await.unwrap();
    assert_eq!(result.requested_count, 3);
    assert_eq!(result.deleted_count, 1);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].row_index, 40);
    assert_eq!(engine.row_count(), 4);
}

#[tokio::test]
async fn test_delete_tops_up_to_floor() {
    // minimum 2 -> floor 3; four rows, delete three
    let engine = TestGridBuilder::new()
        .with_minimum_rows(2)
        .with_rows(people(4))
        .build()
        .await;

    let result = engine.smart_delete(&[0, 1, 2]).await.unwrap();
    // Index 2 is removed (4 > 3), then 1 and 0 are cleared (3 == 3)
    assert_eq!(result.deleted_count, 1);
    assert_eq!(result.cleared_count, 2);
    assert_eq!(result.appended_count, 0);
    assert_eq!(result.final_row_count, 3);

    let row = engine.get_row(2).unwrap();
    assert_eq!(row.get("Name"), Some(&CellValue::from("p3")));
}

#[tokio::test]
async fn test_empty_request_is_rejected() {
    let engine = TestGridBuilder::new().build().await;
    assert!(matches!(
        engine.smart_delete(&[]).await,
        Err(GridError::EmptyInput(_))
    ));
}

#[tokio::test]
async fn test_delete_before_initialize_fails() {
    let engine = gridstore::GridEngine::new(crate::helpers::test_config(0)).unwrap();
    assert!(matches!(
        engine.smart_delete(&[0]).await,
        Err(GridError::NotInitialized)
    ));
}
