//! Error types for grid operations
//!
//! Provides unified error handling for the row store, the pipelines and
//! the engine facade. Per-row problems never show up here; they are
//! collected into the operation's result instead.

use thiserror::Error;

/// Errors that abort a grid operation
#[derive(Error, Debug)]
pub enum GridError {
    /// An operation ran before `initialize`
    #[error("Grid is not initialized")]
    NotInitialized,

    /// Initialize was called without columns
    #[error("No columns defined")]
    NoColumns,

    /// Two columns share a name
    #[error("Duplicate column name: {0}")]
    DuplicateColumn(String),

    /// A column name that is not part of the schema
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    /// Row index outside `[0, row_count)`
    #[error("Row {index} not found (row count {row_count})")]
    NotFound { index: usize, row_count: usize },

    /// Empty input where at least one item is required
    #[error("Empty input: {0}")]
    EmptyInput(&'static str),

    /// Configuration value out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid data format
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Cooperative cancellation was requested
    #[error("Operation cancelled")]
    Cancelled,

    /// No tokio runtime available for background work
    #[error("No async runtime available")]
    NoRuntime,

    /// A worker task panicked or was aborted
    #[error("Worker task failed: {0}")]
    TaskFailed(String),

    /// IO error from std::io
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error from serde_json
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// Generic error message
    #[error("{0}")]
    Other(String),
}

/// Result type alias for grid operations
pub type GridResult<T> = Result<T, GridError>;

impl From<tokio::task::JoinError> for GridError {
    fn from(e: tokio::task::JoinError) -> Self {
        GridError::TaskFailed(e.to_string())
    }
}

impl From<String> for GridError {
    fn from(s: String) -> Self {
        GridError::Other(s)
    }
}

impl From<&str> for GridError {
    fn from(s: &str) -> Self {
        GridError::Other(s.to_string())
    }
}
