//! Validation batcher.
//!
//! Rules are evaluated per cell. Full-dataset validation walks a snapshot
//! in fixed-size batches, pausing between batches so it does not starve
//! other tasks, and skips empty rows. Datasets above the configured row
//! ceiling are not validated at all; the caller gets a vacuous success
//! flagged with `skipped_full_validation`.

use crate::config::GridConfig;
use crate::data::{GridResult, Schema, Snapshot};
use crate::engine::cancel::CancellationToken;
use crate::types::{
    BatchProgress, CellValue, ColumnDefinition, DataRow, ProgressCallback, ValidationError,
    ValidationResult, ValidationRule,
};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

// ============================================================================
// Cell Rules
// ============================================================================

/// Failure messages for one cell; empty when the value is valid
pub fn validate_cell(column: &ColumnDefinition, value: &CellValue) -> Vec<String> {
    let mut failures = Vec::new();

    let required =
        column.required || column.rules.iter().any(|r| matches!(r, ValidationRule::Required));
    if value.is_blank() {
        if required {
            failures.push(format!("{} is required", column.name));
        }
        return failures;
    }

    if !value.matches_type(column.data_type) {
        failures.push(format!(
            "{} must be a {} value",
            column.name,
            column.data_type.label()
        ));
    }

    if let Some(max) = column.max_length {
        check_max_length(column, value, max, &mut failures);
    }

    for rule in &column.rules {
        match rule {
            ValidationRule::Required => {}
            ValidationRule::MaxLength(max) => check_max_length(column, value, *max, &mut failures),
            ValidationRule::Range { min, max } => match value.as_f64() {
                Some(n) if n < *min || n > *max => failures.push(format!(
                    "{} must be between {} and {}",
                    column.name, min, max
                )),
                Some(_) => {}
                None => failures.push(format!("{} must be numeric", column.name)),
            },
            ValidationRule::Custom {
                message, predicate, ..
            } => {
                if !predicate(value) {
                    failures.push(message.clone());
                }
            }
        }
    }

    failures
}

fn check_max_length(column: &ColumnDefinition, value: &CellValue, max: usize, out: &mut Vec<String>) {
    if value.display_len() > max {
        out.push(format!(
            "{} exceeds maximum length of {}",
            column.name, max
        ));
    }
}

/// Per-row tally
#[derive(Debug, Default)]
pub struct RowCheck {
    pub total_cells: usize,
    pub invalid_cells: usize,
    pub errors: Vec<ValidationError>,
}

impl RowCheck {
    pub fn is_valid(&self) -> bool {
        self.invalid_cells == 0
    }
}

/// Check every cell of a row against its column
pub fn check_cells(schema: &Schema, cells: &[CellValue], row_index: usize) -> RowCheck {
    let mut check = RowCheck::default();
    for (column, value) in schema.columns().iter().zip(cells.iter()) {
        check.total_cells += 1;
        let failures = validate_cell(column, value);
        if failures.is_empty() {
            continue;
        }
        check.invalid_cells += 1;
        check
            .errors
            .extend(failures.into_iter().map(|message| ValidationError {
                column: column.name.clone(),
                message,
                row_index,
            }));
    }
    check
}

/// Validate a single stored row
pub fn validate_row(schema: &Schema, row: &DataRow, row_index: usize) -> ValidationResult {
    let start = Instant::now();
    let mut result = ValidationResult::default();
    if row.is_empty() {
        result.empty_rows_skipped = 1;
    } else {
        accumulate(&mut result, check_cells(schema, &row.cells, row_index));
    }
    result.is_valid = result.invalid_cells == 0;
    result.duration = start.elapsed();
    result
}

fn accumulate(result: &mut ValidationResult, check: RowCheck) {
    result.rows_checked += 1;
    result.total_cells += check.total_cells;
    result.invalid_cells += check.invalid_cells;
    result.valid_cells += check.total_cells - check.invalid_cells;
    result.errors.extend(check.errors);
}

// ============================================================================
// Batcher
// ============================================================================

/// Per-call options for full validation
#[derive(Clone, Default)]
pub struct ValidationOptions {
    pub cancellation: Option<CancellationToken>,
    pub progress: Option<ProgressCallback>,
}

impl ValidationOptions {
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }
}

/// Batched, throttled validation over a snapshot
#[derive(Clone, Debug)]
pub struct ValidationBatcher {
    batch_size: usize,
    throttle: Duration,
    max_rows: usize,
}

impl ValidationBatcher {
    pub fn new(batch_size: usize, throttle: Duration, max_rows: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            throttle,
            max_rows,
        }
    }

    pub fn from_config(config: &GridConfig) -> Self {
        Self::new(
            config.validation_batch_size,
            config.validation_throttle(),
            config.max_rows_for_full_validation,
        )
    }

    /// Whether a dataset of this size is validated at all
    pub fn within_ceiling(&self, row_count: usize) -> bool {
        row_count <= self.max_rows
    }

    pub async fn validate(
        &self,
        snapshot: &Snapshot,
        options: &ValidationOptions,
    ) -> GridResult<ValidationResult> {
        let start = Instant::now();
        let total = snapshot.len();

        if !self.within_ceiling(total) {
            warn!(
                rows = total,
                max_rows = self.max_rows,
                "dataset above validation ceiling, skipping full validation"
            );
            let mut result = ValidationResult::vacuous();
            result.duration = start.elapsed();
            return Ok(result);
        }

        let mut result = ValidationResult::default();
        let mut processed = 0;

        for (batch_index, batch) in snapshot.rows.chunks(self.batch_size).enumerate() {
            if let Some(token) = &options.cancellation {
                token.check()?;
            }

            let offset = batch_index * self.batch_size;
            let mut batch_invalid_rows = 0;
            for (i, row) in batch.iter().enumerate() {
                if row.is_empty() {
                    result.empty_rows_skipped += 1;
                    continue;
                }
                let check = check_cells(&snapshot.schema, &row.cells, offset + i);
                if !check.is_valid() {
                    batch_invalid_rows += 1;
                }
                accumulate(&mut result, check);
            }
            processed += batch.len();

            if let Some(progress) = &options.progress {
                progress(&BatchProgress {
                    processed,
                    total,
                    succeeded: batch.len() - batch_invalid_rows,
                    failed: batch_invalid_rows,
                    elapsed: start.elapsed(),
                });
            }

            if processed < total {
                pause(self.throttle).await;
            }
        }

        result.is_valid = result.invalid_cells == 0;
        result.duration = start.elapsed();

        debug!(
            rows_checked = result.rows_checked,
            empty_rows = result.empty_rows_skipped,
            invalid_cells = result.invalid_cells,
            elapsed_ms = result.duration.as_millis() as u64,
            "validation finished"
        );
        Ok(result)
    }
}

/// Sleep for `interval`, or just yield when it is zero
pub(crate) async fn pause(interval: Duration) {
    if interval.is_zero() {
        tokio::task::yield_now().await;
    } else {
        tokio::time::sleep(interval).await;
    }
}
