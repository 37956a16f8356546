//! JSON row source.
//!
//! Accepts an array of objects, or an object wrapping one under a common
//! key (`data`, `rows`, `items`, `records`, `results`). Values arrive as
//! loosely typed cells; the schema coerces them on import.

use crate::data::error::{GridError, GridResult};
use crate::types::{CellValue, RowDict};
use serde_json::Value;

const WRAPPER_KEYS: [&str; 5] = ["data", "rows", "items", "records", "results"];

/// Parse JSON content into dictionary rows
pub fn parse_json_rows(json: &str) -> GridResult<Vec<RowDict>> {
    let value: Value = serde_json::from_str(json)?;
    let array = extract_array(&value)?;

    array
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let obj = item.as_object().ok_or_else(|| {
                GridError::InvalidData(format!("element {} is not an object", i))
            })?;
            Ok(obj
                .iter()
                .map(|(key, value)| (key.clone(), json_value_to_cell(value)))
                .collect())
        })
        .collect()
}

fn extract_array(value: &Value) -> GridResult<&Vec<Value>> {
    match value {
        Value::Array(arr) => Ok(arr),
        Value::Object(obj) => WRAPPER_KEYS
            .iter()
            .find_map(|key| match obj.get(*key) {
                Some(Value::Array(arr)) => Some(arr),
                _ => None,
            })
            .ok_or_else(|| {
                GridError::InvalidData(
                    "JSON must be an array or have a data/rows/items/records/results array"
                        .to_string(),
                )
            }),
        _ => Err(GridError::InvalidData(
            "JSON must be an array of objects".to_string(),
        )),
    }
}

/// Convert a JSON value to a cell. Strings stay text until coerced.
pub fn json_value_to_cell(value: &Value) -> CellValue {
    match value {
        Value::Null => CellValue::Empty,
        Value::Bool(b) => CellValue::Boolean(*b),
        Value::Number(n) => n.as_f64().map(CellValue::Number).unwrap_or_default(),
        Value::String(s) if s.is_empty() => CellValue::Empty,
        Value::String(s) => CellValue::Text(s.clone()),
        Value::Array(arr) => CellValue::Text(
            arr.iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(", "),
        ),
        Value::Object(_) => CellValue::Text(value.to_string()),
    }
}

/// Convert a cell to JSON, writing whole numbers as integers
pub fn cell_to_json_value(cell: &CellValue) -> Value {
    match cell {
        CellValue::Text(s) | CellValue::Date(s) => Value::String(s.clone()),
        CellValue::Number(n) => {
            if n.fract() == 0.0 && *n >= i64::MIN as f64 && *n <= i64::MAX as f64 {
                Value::Number(serde_json::Number::from(*n as i64))
            } else {
                serde_json::Number::from_f64(*n)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
        }
        CellValue::Boolean(b) => Value::Bool(*b),
        CellValue::Empty => Value::Null,
    }
}

/// Dictionary rows as a JSON array of plain objects
pub fn rows_to_json_value(rows: &[RowDict]) -> Value {
    Value::Array(
        rows.iter()
            .map(|row| {
                Value::Object(
                    row.iter()
                        .map(|(name, cell)| (name.clone(), cell_to_json_value(cell)))
                        .collect(),
                )
            })
            .collect(),
    )
}

/// Serialize dictionary rows as a pretty-printed array of objects
pub fn rows_to_json(rows: &[RowDict]) -> GridResult<String> {
    Ok(serde_json::to_string_pretty(&rows_to_json_value(rows))?)
}
