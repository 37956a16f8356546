//! Row storage and data interchange
//!
//! `RowStore` is the single source of truth for grid contents. The
//! `table_source` and `json_source` modules convert between stored rows
//! and polars frames or JSON documents.
//!
//! ## Error Handling
//!
//! All data operations return `GridResult<T>` which uses the `GridError` type.
//! Common errors include:
//! - `NotInitialized`: An operation ran before the grid had columns
//! - `NotFound`: A row index outside the grid
//! - `UnknownColumn`: A value keyed by a column the grid does not have
//! - `Polars`/`Json`: Interchange errors

mod error;
mod json_source;
mod row_store;
mod table_source;

pub use error::*;
pub use json_source::*;
pub use row_store::*;
pub use table_source::*;
