//! Unit tests for the virtualization cache and memory sweeps.

use crate::helpers::{people, person, test_config, TestGridBuilder};
use gridstore::CellValue;

#[tokio::test]
async fn test_get_row_hits_cache_on_second_read() {
    let engine = TestGridBuilder::new().with_rows(people(5)).build().await;

    engine.get_row(2).unwrap();
    engine.get_row(2).unwrap();

    let stats = engine.cache_stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.entries, 1);
}

#[tokio::test]
async fn test_cache_never_serves_stale_rows() {
    let engine = TestGridBuilder::new().with_rows(people(5)).build().await;
    assert_eq!(
        engine.get_row(1).unwrap().get("Name"),
        Some(&CellValue::from("p1"))
    );

    engine.set_row(1, person("replaced", 99)).await.unwrap();
    assert_eq!(
        engine.get_row(1).unwrap().get("Name"),
        Some(&CellValue::from("replaced"))
    );

    // Index 1 now refers to what was row 2
    engine.smart_delete(&[0]).await.unwrap();
    assert_eq!(
        engine.get_row(1).unwrap().get("Name"),
        Some(&CellValue::from("p2"))
    );
}

#[tokio::test]
async fn test_window_reads_populate_cache() {
    let config = test_config(0).with_cache_size(4);
    let engine = TestGridBuilder::new()
        .with_config(config)
        .with_rows(people(10))
        .build()
        .await;

    let rows = engine.get_rows(2, 6).unwrap();
    assert_eq!(rows.len(), 6);
    assert_eq!(rows[0].index, 2);
    assert_eq!(rows[5].get("Name"), Some(&CellValue::from("p7")));

    let stats = engine.cache_stats();
    assert_eq!(stats.capacity, 4);
    assert_eq!(stats.entries, 4);
    assert_eq!(stats.evictions, 2);
}

#[tokio::test]
async fn test_memory_sweep_shrinks_cache_and_compacts_store() {
    let config = test_config(0).with_cache_size(8);
    let engine = TestGridBuilder::new()
        .with_config(config)
        .with_rows(people(20))
        .build()
        .await;
    engine.get_rows(0, 8).unwrap();
    assert_eq!(engine.cache_stats().entries, 8);

    let report = engine.run_memory_sweep();
    assert!(report.store_compacted);
    assert_eq!(report.evicted_entries, 4);
    assert_eq!(engine.cache_stats().entries, 4);
    assert!(report.estimated_store_bytes > 0);
}

#[tokio::test]
async fn test_sweep_prunes_entries_from_older_generations() {
    let engine = TestGridBuilder::new().with_rows(people(6)).build().await;
    engine.get_rows(0, 6).unwrap();

    engine.add_row(person("new", 1)).await.unwrap();
    let report = engine.run_memory_sweep();
    assert_eq!(report.pruned_entries, 6);
    assert_eq!(engine.cache_stats().entries, 0);
}
