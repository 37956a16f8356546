//! Test helpers and builders for reducing boilerplate in tests.
//!
//! This module provides:
//! - `TestGridBuilder` - Builder for initialized engines with preloaded rows
//! - Row fixtures like `person()` and `people()`
//! - Polling helpers for callback subscriptions

#![allow(dead_code)]

use gridstore::{
    CellValue, ColumnDefinition, DataType, GridConfig, GridEngine, ImportOptions, RowDict,
};
use std::time::Duration;

// ============================================================================
// Fixtures
// ============================================================================

/// `Name` (required text) and `Age` (number)
pub fn people_columns() -> Vec<ColumnDefinition> {
    vec![
        ColumnDefinition::text("Name").required(),
        ColumnDefinition::new("Age", DataType::Number),
    ]
}

pub fn person(name: &str, age: i64) -> RowDict {
    let mut row = RowDict::new();
    row.insert("Name".to_string(), CellValue::from(name));
    row.insert("Age".to_string(), CellValue::from(age));
    row
}

/// Rows `p0..p{n-1}` whose age equals their number
pub fn people(n: usize) -> Vec<RowDict> {
    (0..n).map(|i| person(&format!("p{}", i), i as i64)).collect()
}

/// Config with no timers firing during a test and no throttling
pub fn test_config(minimum_row_count: usize) -> GridConfig {
    GridConfig::default()
        .with_minimum_row_count(minimum_row_count)
        .with_validation_throttle_ms(0)
        .with_cleanup_intervals(3_600_000, 3_600_000)
}

pub fn name_of(row: &RowDict) -> Option<&str> {
    match row.get("Name") {
        Some(CellValue::Text(s)) => Some(s.as_str()),
        _ => None,
    }
}

// ============================================================================
// TestGridBuilder
// ============================================================================

/// Builder for initialized engines.
///
/// # Example
/// ```ignore
/// let engine = TestGridBuilder::new()
///     .with_minimum_rows(2)
///     .with_rows(people(5))
///     .build()
///     .await;
/// ```
pub struct TestGridBuilder {
    columns: Vec<ColumnDefinition>,
    config: GridConfig,
    rows: Vec<RowDict>,
}

impl Default for TestGridBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestGridBuilder {
    pub fn new() -> Self {
        Self {
            columns: people_columns(),
            config: test_config(0),
            rows: Vec::new(),
        }
    }

    pub fn with_columns(mut self, columns: Vec<ColumnDefinition>) -> Self {
        self.columns = columns;
        self
    }

    pub fn with_minimum_rows(mut self, minimum: usize) -> Self {
        self.config = self.config.with_minimum_row_count(minimum);
        self
    }

    pub fn with_config(mut self, config: GridConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_rows(mut self, rows: Vec<RowDict>) -> Self {
        self.rows = rows;
        self
    }

    /// Initialize and import; rows are imported without validation
    pub async fn build(self) -> GridEngine {
        gridstore::logging::init_test_tracing();
        let engine = GridEngine::new(self.config.clone()).unwrap();
        engine.initialize(self.columns, self.config).await.unwrap();
        if !self.rows.is_empty() {
            let result = engine
                .import_rows(self.rows, ImportOptions::default().with_validation(false))
                .await
                .unwrap();
            assert!(result.success);
        }
        engine
    }
}

// ============================================================================
// Polling
// ============================================================================

/// Poll `condition` until it holds or two seconds pass
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
