//! Smart delete.
//!
//! Deleting a row either removes it (later rows shift down by one) or,
//! when the grid is already at its minimum floor, blanks it in place so
//! the grid never shrinks below the floor. Indices are applied highest
//! first so each index still refers to the row the caller meant.

use crate::data::{minimum_floor, RowsWriter};
use crate::types::{DeleteResult, RowError};
use std::collections::BTreeSet;

/// How a single index is deleted
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteAction {
    /// Physically remove the row
    Remove,
    /// Blank the row's values, keeping its index and id
    ClearContent,
}

/// Action for the next index given the current row count
pub fn decide(current_row_count: usize, minimum_row_count: usize) -> DeleteAction {
    if current_row_count > minimum_floor(minimum_row_count) {
        DeleteAction::Remove
    } else {
        DeleteAction::ClearContent
    }
}

/// Outcome of applying a delete inside a write section
#[derive(Debug, Default)]
pub struct DeletePlan {
    pub result: DeleteResult,
    /// Valid indices that were removed or cleared, ascending
    pub affected: Vec<usize>,
}

/// Delete `indices` and top the grid back up to the minimum floor.
///
/// Out-of-range indices become row errors; duplicates count once.
pub fn apply(writer: &mut RowsWriter<'_>, indices: &[usize]) -> DeletePlan {
    let minimum = writer.minimum_row_count();
    let unique: BTreeSet<usize> = indices.iter().copied().collect();

    let mut result = DeleteResult {
        requested_count: indices.len(),
        ..Default::default()
    };
    let mut affected = Vec::with_capacity(unique.len());

    for &index in unique.iter().rev() {
        if index >= writer.len() {
            result.errors.push(RowError::new(
                index,
                format!("row index out of range (row count {})", writer.len()),
            ));
            continue;
        }

        match decide(writer.len(), minimum) {
            DeleteAction::Remove => {
                writer.remove(index);
                result.deleted_count += 1;
            }
            DeleteAction::ClearContent => {
                writer.clear_content(index);
                result.cleared_count += 1;
            }
        }
        affected.push(index);
    }

    result.appended_count = writer.ensure_minimum();
    result.final_row_count = writer.len();
    affected.reverse();

    DeletePlan { result, affected }
}
