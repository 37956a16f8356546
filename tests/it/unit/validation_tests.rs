//! Unit tests for the validation batcher.

use crate::helpers::{people_columns, person, test_config, TestGridBuilder};
use gridstore::data::RowStore;
use gridstore::engine::ValidationBatcher;
use gridstore::types::BatchProgress;
use gridstore::{CancellationToken, CellValue, GridError, RowDict, ValidationOptions};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn mixed_rows() -> Vec<RowDict> {
    let mut bad = person("Bob", 0);
    bad.insert("Age".to_string(), CellValue::from("abc"));
    vec![person("Alice", 30), bad, person("Carol", 40)]
}

#[tokio::test]
async fn test_full_validation_counts_and_skips_empty_rows() {
    // minimum 10 -> 11 rows, 8 of them padding
    let engine = TestGridBuilder::new()
        .with_minimum_rows(10)
        .with_rows(mixed_rows())
        .build()
        .await;
    assert_eq!(engine.row_count(), 11);

    let result = engine
        .validate_all(ValidationOptions::default())
        .await
        .unwrap();
    assert!(!result.is_valid);
    assert!(!result.skipped_full_validation);
    assert_eq!(result.rows_checked, 3);
    assert_eq!(result.empty_rows_skipped, 8);
    assert_eq!(result.total_cells, 6);
    assert_eq!(result.valid_cells, 5);
    assert_eq!(result.invalid_cells, 1);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].row_index, 1);
    assert_eq!(result.errors[0].column, "Age");
}

#[tokio::test]
async fn test_ceiling_returns_vacuous_success() {
    let config = test_config(10).with_max_rows_for_full_validation(5);
    let engine = TestGridBuilder::new()
        .with_config(config)
        .with_rows(mixed_rows())
        .build()
        .await;

    let result = engine
        .validate_all(ValidationOptions::default())
        .await
        .unwrap();
    assert!(result.is_valid);
    assert!(result.skipped_full_validation);
    assert_eq!(result.rows_checked, 0);
    assert!(result.errors.is_empty());
}

#[tokio::test]
async fn test_cancelled_validation_fails() {
    let engine = TestGridBuilder::new().with_rows(mixed_rows()).build().await;
    let token = CancellationToken::new();
    token.cancel();

    let result = engine
        .validate_all(ValidationOptions::default().with_cancellation(token))
        .await;
    assert!(matches!(result, Err(GridError::Cancelled)));
}

#[tokio::test]
async fn test_batcher_reports_each_batch() {
    let store = RowStore::new();
    store.initialize(people_columns(), 0).unwrap();
    store
        .write_rows(|w| {
            for i in 0..25 {
                w.push(vec![CellValue::from(format!("p{}", i)), CellValue::Number(i as f64)]);
            }
        })
        .unwrap();
    let snapshot = store.snapshot().unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let last_processed = Arc::new(AtomicUsize::new(0));
    let progress = {
        let calls = Arc::clone(&calls);
        let last_processed = Arc::clone(&last_processed);
        Arc::new(move |p: &BatchProgress| {
            calls.fetch_add(1, Ordering::SeqCst);
            last_processed.store(p.processed, Ordering::SeqCst);
        })
    };

    let batcher = ValidationBatcher::new(10, Duration::ZERO, 1_000);
    let result = batcher
        .validate(&snapshot, &ValidationOptions::default().with_progress(progress))
        .await
        .unwrap();

    assert!(result.is_valid);
    assert_eq!(result.rows_checked, 25);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(last_processed.load(Ordering::SeqCst), 25);
    assert!(batcher.within_ceiling(1_000));
    assert!(!batcher.within_ceiling(1_001));
}

#[tokio::test]
async fn test_small_batches_report_each_batch() {
    let config = test_config(0).with_validation_batch_size(10);
    let engine = TestGridBuilder::new()
        .with_config(config)
        .with_rows(crate::helpers::people(25))
        .build()
        .await;

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let options = ValidationOptions::default().with_progress(Arc::new(move |_: &BatchProgress| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    let result = engine.validate_all(options).await.unwrap();
    assert!(result.is_valid);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_update_cell_revalidates_row() {
    let engine = TestGridBuilder::new().with_rows(mixed_rows()).build().await;
    let mut validations = engine.validation_changes();

    engine
        .update_cell(0, "Age", CellValue::from("not a number"))
        .await
        .unwrap();

    let event = validations.try_recv().unwrap();
    assert_eq!(event.affected_row, Some(0));
    assert!(!event.result.is_valid);
    assert_eq!(event.result.errors[0].column, "Age");
}

#[tokio::test]
async fn test_update_cell_skips_validation_when_disabled() {
    let config = test_config(0).with_realtime_validation(false);
    let engine = TestGridBuilder::new()
        .with_config(config)
        .with_rows(mixed_rows())
        .build()
        .await;
    let mut validations = engine.validation_changes();

    engine
        .update_cell(0, "Age", CellValue::from("31"))
        .await
        .unwrap();

    assert!(validations.try_recv().is_err());
    assert_eq!(
        engine.get_row(0).unwrap().get("Age"),
        Some(&CellValue::Number(31.0))
    );
}
