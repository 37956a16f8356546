//! In-memory tabular data engine for large editable grids.
//!
//! ## Modules
//!
//! - `data`: row store, schema, and polars/JSON interchange
//! - `engine`: the `GridEngine` facade with smart delete, batch
//!   import/export, validation, the virtualization cache, background
//!   memory timers and the change bus
//! - `config`: `GridConfig` tunables
//! - `perf`: per-operation timing
//! - `logging`: tracing subscriber setup

pub mod config;
pub mod constants;
pub mod data;
pub mod engine;
pub mod logging;
pub mod perf;
pub mod types;

pub use config::GridConfig;
pub use data::{GridError, GridResult};
pub use engine::{
    CancellationToken, DataChangeEvent, DataChangeKind, ExportOptions, GridEngine, ImportOptions,
    ValidationChangeEvent, ValidationOptions,
};
pub use types::{
    CellValue, ColumnDefinition, DataGridState, DataType, DeleteResult, ImportResult, Row,
    RowDict, ValidationResult, ValidationRule,
};
