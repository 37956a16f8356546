//! Tabular interchange through polars data frames.
//!
//! Imports read a frame column by column into dictionary rows; exports
//! build one typed column per grid column, falling back to strings when
//! a column holds values that do not match its declared type.

use crate::data::error::GridResult;
use crate::types::{CellValue, ColumnDefinition, DataType, RowDict};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

/// Rows sampled when a CSV file's schema is inferred
const CSV_INFER_SCHEMA_ROWS: usize = 1000;

/// Read a CSV file (tab separated for `.tsv`) into a frame
pub fn read_csv(path: &Path) -> GridResult<DataFrame> {
    let separator = if path.extension().map(|e| e == "tsv").unwrap_or(false) {
        b'\t'
    } else {
        b','
    };

    let df = LazyCsvReader::new(path)
        .with_has_header(true)
        .with_separator(separator)
        .with_infer_schema_length(Some(CSV_INFER_SCHEMA_ROWS))
        .finish()?
        .collect()?;

    tracing::debug!(
        path = %path.display(),
        rows = df.height(),
        columns = df.width(),
        "read csv"
    );
    Ok(df)
}

/// Write a frame as CSV
pub fn write_csv(df: &mut DataFrame, path: &Path) -> GridResult<()> {
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).include_header(true).finish(df)?;
    Ok(())
}

/// Dictionary rows for every row in the frame
pub fn frame_to_rows(df: &DataFrame) -> Vec<RowDict> {
    let columns = df.get_columns();
    (0..df.height())
        .map(|idx| {
            columns
                .iter()
                .map(|column| (column.name().to_string(), polars_value_to_cell(column, idx)))
                .collect()
        })
        .collect()
}

/// Build a frame from dictionary rows, one column per definition
pub fn rows_to_frame(columns: &[ColumnDefinition], rows: &[RowDict]) -> GridResult<DataFrame> {
    let series: Vec<Column> = columns
        .iter()
        .map(|definition| build_column(definition, rows))
        .collect();
    Ok(DataFrame::new(series)?)
}

fn build_column(definition: &ColumnDefinition, rows: &[RowDict]) -> Column {
    let name: PlSmallStr = definition.name.as_str().into();
    let cells: Vec<&CellValue> = rows
        .iter()
        .map(|row| row.get(&definition.name).unwrap_or(&CellValue::Empty))
        .collect();

    match definition.data_type {
        DataType::Number if cells.iter().all(|c| matches!(c, CellValue::Number(_) | CellValue::Empty)) => {
            let values: Vec<Option<f64>> = cells
                .iter()
                .map(|c| match c {
                    CellValue::Number(n) => Some(*n),
                    _ => None,
                })
                .collect();
            Column::new(name, values)
        }
        DataType::Boolean if cells.iter().all(|c| matches!(c, CellValue::Boolean(_) | CellValue::Empty)) => {
            let values: Vec<Option<bool>> = cells
                .iter()
                .map(|c| match c {
                    CellValue::Boolean(b) => Some(*b),
                    _ => None,
                })
                .collect();
            Column::new(name, values)
        }
        _ => {
            let values: Vec<Option<String>> = cells
                .iter()
                .map(|c| match c {
                    CellValue::Empty => None,
                    other => Some(other.to_string()),
                })
                .collect();
            Column::new(name, values)
        }
    }
}

fn polars_value_to_cell(column: &Column, row_idx: usize) -> CellValue {
    let Ok(val) = column.get(row_idx) else {
        return CellValue::Empty;
    };
    match val {
        AnyValue::Null => CellValue::Empty,
        AnyValue::Int8(v) => CellValue::Number(v as f64),
        AnyValue::Int16(v) => CellValue::Number(v as f64),
        AnyValue::Int32(v) => CellValue::Number(v as f64),
        AnyValue::Int64(v) => CellValue::Number(v as f64),
        AnyValue::UInt8(v) => CellValue::Number(v as f64),
        AnyValue::UInt16(v) => CellValue::Number(v as f64),
        AnyValue::UInt32(v) => CellValue::Number(v as f64),
        AnyValue::UInt64(v) => CellValue::Number(v as f64),
        AnyValue::Float32(v) => CellValue::Number(v as f64),
        AnyValue::Float64(v) => CellValue::Number(v),
        AnyValue::Boolean(v) => CellValue::Boolean(v),
        AnyValue::String(s) if s.is_empty() => CellValue::Empty,
        AnyValue::String(s) => CellValue::Text(s.to_string()),
        AnyValue::StringOwned(s) => CellValue::Text(s.to_string()),
        other => CellValue::Text(format!("{}", other)),
    }
}
