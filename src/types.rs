//! Core types for the grid engine.
//!
//! Columns, cell values, stored rows, and the immutable outcome records
//! returned by every public operation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Columns
// ============================================================================

/// Supported data types for cells
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    #[default]
    Text,
    Number,
    Boolean,
    Date,
}

impl DataType {
    pub fn label(&self) -> &'static str {
        match self {
            DataType::Text => "text",
            DataType::Number => "number",
            DataType::Boolean => "boolean",
            DataType::Date => "date",
        }
    }
}

/// Horizontal alignment hint for the UI layer
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
}

/// Predicate used by custom validation rules
pub type CellPredicate = Arc<dyn Fn(&CellValue) -> bool + Send + Sync>;

/// A per-column validation rule
#[derive(Clone)]
pub enum ValidationRule {
    /// Value must not be blank
    Required,
    /// Display text must not exceed this many characters
    MaxLength(usize),
    /// Numeric value must fall within `[min, max]`
    Range { min: f64, max: f64 },
    /// Arbitrary predicate; `message` is reported when it returns false
    Custom {
        name: String,
        message: String,
        predicate: CellPredicate,
    },
}

impl ValidationRule {
    /// Build a custom rule from a closure
    pub fn custom<F>(name: impl Into<String>, message: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&CellValue) -> bool + Send + Sync + 'static,
    {
        ValidationRule::Custom {
            name: name.into(),
            message: message.into(),
            predicate: Arc::new(predicate),
        }
    }
}

impl fmt::Debug for ValidationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationRule::Required => write!(f, "Required"),
            ValidationRule::MaxLength(n) => write!(f, "MaxLength({})", n),
            ValidationRule::Range { min, max } => write!(f, "Range({}..={})", min, max),
            ValidationRule::Custom { name, .. } => write!(f, "Custom({})", name),
        }
    }
}

/// Column metadata. Immutable once the grid is initialized.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColumnDefinition {
    /// Column name, unique within the grid
    pub name: String,
    /// Declared value type
    pub data_type: DataType,
    /// Whether a blank value is a validation error
    #[serde(default)]
    pub required: bool,
    /// Maximum display length of a value
    #[serde(default)]
    pub max_length: Option<usize>,
    /// Default width in pixels (UI only)
    #[serde(default)]
    pub width: Option<f32>,
    /// Default alignment (UI only)
    #[serde(default)]
    pub alignment: Alignment,
    /// Extra rules evaluated by the validation batcher
    #[serde(skip)]
    pub rules: Vec<ValidationRule>,
}

impl ColumnDefinition {
    pub fn new(name: &str, data_type: DataType) -> Self {
        Self {
            name: name.to_string(),
            data_type,
            required: false,
            max_length: None,
            width: None,
            alignment: Alignment::default(),
            rules: Vec::new(),
        }
    }

    pub fn text(name: &str) -> Self {
        Self::new(name, DataType::Text)
    }

    pub fn number(name: &str) -> Self {
        Self::new(name, DataType::Number)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    pub fn with_width(mut self, width: f32) -> Self {
        self.width = Some(width);
        self
    }

    pub fn with_alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }

    pub fn with_rule(mut self, rule: ValidationRule) -> Self {
        self.rules.push(rule);
        self
    }
}

// ============================================================================
// Cells & Rows
// ============================================================================

/// A single cell value. `Empty` is the null value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Boolean(bool),
    Date(String), // ISO 8601 format
    #[default]
    Empty,
}

impl CellValue {
    /// True for `Empty` and whitespace-only text
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) | CellValue::Date(s) => s.trim().is_empty(),
            CellValue::Number(_) | CellValue::Boolean(_) => false,
        }
    }

    /// Numeric view of the value, if it has one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Character count of the display text
    pub fn display_len(&self) -> usize {
        match self {
            CellValue::Text(s) | CellValue::Date(s) => s.chars().count(),
            other => other.to_string().chars().count(),
        }
    }

    /// Parse a string into a CellValue, trying to preserve type
    pub fn parse(value: &str, hint: DataType) -> Self {
        if value.is_empty() {
            return CellValue::Empty;
        }

        match hint {
            DataType::Number => value
                .parse::<f64>()
                .map(CellValue::Number)
                .unwrap_or(CellValue::Text(value.to_string())),
            DataType::Boolean => match value.to_lowercase().as_str() {
                "true" | "yes" | "1" => CellValue::Boolean(true),
                "false" | "no" | "0" => CellValue::Boolean(false),
                _ => CellValue::Text(value.to_string()),
            },
            DataType::Date if looks_like_date(value) => CellValue::Date(value.to_string()),
            DataType::Date | DataType::Text => CellValue::Text(value.to_string()),
        }
    }

    /// Convert text into the declared column type when it parses cleanly.
    /// Non-text values are returned unchanged.
    pub fn coerce(self, hint: DataType) -> Self {
        match self {
            CellValue::Text(s) if hint != DataType::Text => {
                let parsed = CellValue::parse(s.trim(), hint);
                if parsed.matches_type(hint) {
                    parsed
                } else {
                    CellValue::Text(s)
                }
            }
            other => other,
        }
    }

    /// Whether the value is acceptable for a column of the given type
    pub fn matches_type(&self, hint: DataType) -> bool {
        matches!(
            (self, hint),
            (CellValue::Empty, _)
                | (_, DataType::Text)
                | (CellValue::Number(_), DataType::Number)
                | (CellValue::Boolean(_), DataType::Boolean)
                | (CellValue::Date(_), DataType::Date)
        )
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(s) | CellValue::Date(s) => write!(f, "{}", s),
            CellValue::Number(n) => {
                // No trailing zeros for whole numbers
                if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            CellValue::Boolean(b) => write!(f, "{}", b),
            CellValue::Empty => Ok(()),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Number(n as f64)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Boolean(b)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(CellValue::Empty)
    }
}

/// Check if a string looks like an ISO date or datetime
pub fn looks_like_date(s: &str) -> bool {
    // ISO date format: YYYY-MM-DD
    if s.len() == 10 && s.chars().filter(|&c| c == '-').count() == 2 {
        let parts: Vec<&str> = s.split('-').collect();
        if parts.len() == 3 && parts[0].len() == 4 && parts[1].len() == 2 && parts[2].len() == 2
        {
            return parts[0].parse::<u32>().is_ok()
                && parts[1].parse::<u32>().is_ok()
                && parts[2].parse::<u32>().is_ok();
        }
    }
    // ISO datetime format: starts with YYYY-MM-DD
    if s.len() > 10 && s.contains('T') && s.is_char_boundary(10) {
        return looks_like_date(&s[..10]);
    }
    false
}

/// Dictionary-of-values form of a row, keyed by column name
pub type RowDict = HashMap<String, CellValue>;

/// A stored row: stable id plus cells aligned with the grid's columns
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DataRow {
    pub id: u64,
    pub cells: Vec<CellValue>,
}

impl DataRow {
    pub fn new(id: u64, cells: Vec<CellValue>) -> Self {
        Self { id, cells }
    }

    pub fn empty(id: u64, column_count: usize) -> Self {
        Self {
            id,
            cells: vec![CellValue::Empty; column_count],
        }
    }

    /// A row is empty iff every value is blank
    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(CellValue::is_blank)
    }
}

/// A row as handed to callers: its current index plus named values
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Row {
    pub index: usize,
    pub id: u64,
    pub values: RowDict,
}

impl Row {
    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.values.get(column)
    }

    pub fn is_empty(&self) -> bool {
        self.values.values().all(CellValue::is_blank)
    }
}

// ============================================================================
// Grid State
// ============================================================================

/// Aggregate snapshot of the grid, derived on demand
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DataGridState {
    pub is_initialized: bool,
    pub row_count: usize,
    pub column_count: usize,
    pub columns: Vec<String>,
    pub minimum_row_count: usize,
    pub last_modified: Option<DateTime<Utc>>,
}

// ============================================================================
// Operation Results
// ============================================================================

/// A problem with a single row, collected instead of aborting the batch
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RowError {
    /// Source position for imports, grid index for deletes
    pub row_index: usize,
    pub column: Option<String>,
    pub message: String,
}

impl RowError {
    pub fn new(row_index: usize, message: impl Into<String>) -> Self {
        Self {
            row_index,
            column: None,
            message: message.into(),
        }
    }

    pub fn for_column(row_index: usize, column: &str, message: impl Into<String>) -> Self {
        Self {
            row_index,
            column: Some(column.to_string()),
            message: message.into(),
        }
    }
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.column {
            Some(column) => write!(f, "row {} [{}]: {}", self.row_index, column, self.message),
            None => write!(f, "row {}: {}", self.row_index, self.message),
        }
    }
}

/// Outcome of an import
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ImportResult {
    /// False when the import was aborted on an invalid row
    pub success: bool,
    pub total_rows: usize,
    pub imported_rows: usize,
    pub error_rows: usize,
    /// Rows never looked at because of cancellation or abort
    pub unprocessed_rows: usize,
    pub cancelled: bool,
    pub errors: Vec<RowError>,
    pub duration: Duration,
}

/// Outcome of a smart delete
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DeleteResult {
    pub requested_count: usize,
    /// Rows physically removed
    pub deleted_count: usize,
    /// Rows whose content was cleared in place
    pub cleared_count: usize,
    /// Empty rows appended to restore the minimum
    pub appended_count: usize,
    pub final_row_count: usize,
    pub errors: Vec<RowError>,
    pub duration: Duration,
}

impl DeleteResult {
    /// Rows actually removed or cleared
    pub fn actual_count(&self) -> usize {
        self.deleted_count + self.cleared_count
    }
}

/// A failed rule for a single cell
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub column: String,
    pub message: String,
    pub row_index: usize,
}

/// Aggregated validation outcome
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub total_cells: usize,
    pub valid_cells: usize,
    pub invalid_cells: usize,
    pub rows_checked: usize,
    /// Empty rows ignored
    pub empty_rows_skipped: usize,
    /// Set when the dataset exceeded the validation ceiling and nothing was checked
    pub skipped_full_validation: bool,
    pub errors: Vec<ValidationError>,
    pub duration: Duration,
}

impl ValidationResult {
    /// Success without checking anything
    pub fn vacuous() -> Self {
        Self {
            is_valid: true,
            skipped_full_validation: true,
            ..Default::default()
        }
    }
}

// ============================================================================
// Progress
// ============================================================================

/// Progress reported after each batch
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct BatchProgress {
    pub processed: usize,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

/// Callback receiving batch progress
pub type ProgressCallback = Arc<dyn Fn(&BatchProgress) + Send + Sync>;
