//! Unit tests for configuration loading.

use gridstore::{GridConfig, GridEngine, GridError};
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_load_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"minimum_row_count": 4, "batch_size": 250, "aggressive_memory_mode": true}}"#
    )
    .unwrap();

    let config = GridConfig::load(file.path()).unwrap();
    assert_eq!(config.minimum_row_count, 4);
    assert_eq!(config.batch_size, 250);
    assert!(config.aggressive_memory_mode);
    assert_eq!(config.cache_size, GridConfig::default().cache_size);
}

#[test]
fn test_load_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let result = GridConfig::load(&dir.path().join("missing.json"));
    assert!(matches!(result, Err(GridError::Io(_))));
}

#[test]
fn test_malformed_json() {
    let result = GridConfig::from_json("{ not json");
    assert!(matches!(result, Err(GridError::Json(_))));
}

#[test]
fn test_zero_cache_size_rejected() {
    let result = GridConfig::from_json(r#"{"cache_size": 0}"#);
    assert!(matches!(result, Err(GridError::InvalidConfig(_))));
}

#[test]
fn test_engine_rejects_invalid_config() {
    let config = GridConfig::default().with_validation_batch_size(0);
    assert!(matches!(
        GridEngine::new(config),
        Err(GridError::InvalidConfig(_))
    ));
}

#[tokio::test]
async fn test_initialize_rejects_invalid_config() {
    let engine = GridEngine::new(GridConfig::default()).unwrap();
    let result = engine
        .initialize(
            crate::helpers::people_columns(),
            GridConfig::default().with_batch_size(0),
        )
        .await;
    assert!(matches!(result, Err(GridError::InvalidConfig(_))));
    assert!(!engine.is_initialized());
}

#[test]
fn test_worker_count_honours_cap() {
    assert_eq!(GridConfig::default().with_max_workers(3).worker_count(), 3);
    assert!(GridConfig::default().worker_count() >= 1);
}
