//! Integration tests for reads and writes running at the same time.

use crate::helpers::{name_of, people, person, test_config, TestGridBuilder};
use gridstore::{CellValue, ExportOptions, ImportOptions};
use std::collections::BTreeSet;
use std::sync::Arc;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_exports_during_import_see_whole_batches() {
    let config = test_config(0).with_parallel(false);
    let engine = Arc::new(TestGridBuilder::new().with_config(config).build().await);

    let importer = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            engine
                .import_rows(people(50_000), ImportOptions::default().with_batch_size(1_000))
                .await
        })
    };

    let mut observed = Vec::new();
    while !importer.is_finished() {
        let rows = engine.export(ExportOptions::default()).await.unwrap();
        observed.push(rows.len());
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(name_of(row), Some(format!("p{}", i).as_str()));
            assert_eq!(row.get("Age"), Some(&CellValue::Number(i as f64)));
        }
        tokio::task::yield_now().await;
    }

    let result = importer.await.unwrap().unwrap();
    assert_eq!(result.imported_rows, 50_000);
    assert!(observed.iter().all(|n| n % 1_000 == 0));
    assert_eq!(engine.export(ExportOptions::default()).await.unwrap().len(), 50_000);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_add_row_assigns_distinct_indices() {
    let engine = Arc::new(TestGridBuilder::new().build().await);

    let handles: Vec<_> = (0..20)
        .map(|i| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.add_row(person(&format!("w{}", i), i)).await })
        })
        .collect();

    let mut indices = BTreeSet::new();
    for handle in handles {
        indices.insert(handle.await.unwrap().unwrap());
    }

    assert_eq!(indices, (0..20).collect::<BTreeSet<usize>>());
    assert_eq!(engine.row_count(), 20);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reads_during_deletes_stay_in_bounds() {
    let engine = Arc::new(
        TestGridBuilder::new()
            .with_minimum_rows(10)
            .with_rows(people(200))
            .build()
            .await,
    );

    let deleter = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            for _ in 0..100 {
                engine.smart_delete(&[0, 1]).await.unwrap();
            }
        })
    };

    while !deleter.is_finished() {
        let count = engine.row_count();
        assert!(count >= 11);
        let window = engine.get_rows(0, 20).unwrap();
        assert!(window.len() <= 20);
        tokio::task::yield_now().await;
    }
    deleter.await.unwrap();

    // Removals stop at the floor of 11; after that rows 0 and 1 are blanked
    assert_eq!(engine.row_count(), 11);
    let remaining = engine.export(ExportOptions::default()).await.unwrap();
    assert_eq!(remaining.len(), 9);
    assert_eq!(name_of(&remaining[0]), Some("p191"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_never_see_row_count_below_floor_during_import() {
    let config = test_config(50).with_parallel(false);
    let engine = Arc::new(
        TestGridBuilder::new()
            .with_config(config)
            .with_rows(people(20))
            .build()
            .await,
    );

    let importer = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            engine
                .import_rows(people(5_000), ImportOptions::default().with_batch_size(10))
                .await
        })
    };

    while !importer.is_finished() {
        assert!(engine.row_count() >= 51);
        assert!(engine.state().row_count >= 51);
        tokio::task::yield_now().await;
    }

    let result = importer.await.unwrap().unwrap();
    assert_eq!(result.imported_rows, 5_000);
    assert_eq!(engine.row_count(), 5_000);
}
