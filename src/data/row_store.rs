//! Canonical row storage.
//!
//! Rows live in a dense vector behind a reader-writer lock; the position
//! in the vector is the row index, so removing a row re-keys every later
//! row in one shift. Each row is an `Arc<DataRow>` that is replaced, never
//! edited in place, which lets readers take a point-in-time snapshot by
//! cloning the pointer list and never observe a half-written row.
//!
//! The schema lives under the same lock as the rows so a snapshot always
//! pairs rows with the columns they were written against.

use crate::data::error::{GridError, GridResult};
use crate::types::{CellValue, ColumnDefinition, DataGridState, DataRow, Row, RowDict};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Row count the grid is kept at or above for a given minimum.
///
/// The minimum plus one spare editing row. Smart delete switches from
/// removal to content-clear at the same threshold.
pub fn minimum_floor(minimum_row_count: usize) -> usize {
    minimum_row_count + 1
}

// ============================================================================
// Schema
// ============================================================================

/// Validated column list with name lookup
#[derive(Debug)]
pub struct Schema {
    columns: Vec<ColumnDefinition>,
    positions: HashMap<String, usize>,
}

impl Schema {
    /// Fails on an empty column list, blank names or duplicate names
    pub fn new(columns: Vec<ColumnDefinition>) -> GridResult<Self> {
        if columns.is_empty() {
            return Err(GridError::NoColumns);
        }

        let mut positions = HashMap::with_capacity(columns.len());
        for (i, column) in columns.iter().enumerate() {
            if column.name.trim().is_empty() {
                return Err(GridError::InvalidData(format!(
                    "column {} has a blank name",
                    i
                )));
            }
            if positions.insert(column.name.clone(), i).is_some() {
                return Err(GridError::DuplicateColumn(column.name.clone()));
            }
        }

        Ok(Self { columns, positions })
    }

    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.position(name).map(|i| &self.columns[i])
    }

    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Resolve column names to positions, failing on the first unknown name
    pub fn resolve(&self, names: &[String]) -> GridResult<Vec<usize>> {
        names
            .iter()
            .map(|name| {
                self.position(name)
                    .ok_or_else(|| GridError::UnknownColumn(name.clone()))
            })
            .collect()
    }

    /// Named values of a stored row
    pub fn to_dict(&self, row: &DataRow) -> RowDict {
        self.columns
            .iter()
            .zip(row.cells.iter())
            .map(|(column, cell)| (column.name.clone(), cell.clone()))
            .collect()
    }

    /// Named values restricted to the given column positions
    pub fn project(&self, row: &DataRow, positions: &[usize]) -> RowDict {
        positions
            .iter()
            .map(|&i| {
                let value = row.cells.get(i).cloned().unwrap_or_default();
                (self.columns[i].name.clone(), value)
            })
            .collect()
    }

    /// Positional cells for a dictionary row. Missing columns are empty,
    /// text is coerced to the declared type, unknown columns are an error.
    pub fn to_cells(&self, values: RowDict) -> GridResult<Vec<CellValue>> {
        let mut cells = vec![CellValue::Empty; self.columns.len()];
        for (name, value) in values {
            let position = self
                .position(&name)
                .ok_or(GridError::UnknownColumn(name))?;
            cells[position] = value.coerce(self.columns[position].data_type);
        }
        Ok(cells)
    }

    pub fn to_row(&self, index: usize, row: &DataRow) -> Row {
        Row {
            index,
            id: row.id,
            values: self.to_dict(row),
        }
    }
}

// ============================================================================
// Row Store
// ============================================================================

struct RowTable {
    schema: Option<Arc<Schema>>,
    rows: Vec<Arc<DataRow>>,
    /// Bumped by every write section; lets caches detect stale entries
    generation: u64,
}

/// Point-in-time view of the grid
#[derive(Clone)]
pub struct Snapshot {
    pub schema: Arc<Schema>,
    pub rows: Vec<Arc<DataRow>>,
    pub generation: u64,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Thread-safe canonical storage of rows keyed by index
pub struct RowStore {
    table: RwLock<RowTable>,
    next_row_id: AtomicU64,
    minimum_row_count: AtomicUsize,
    last_modified: RwLock<Option<DateTime<Utc>>>,
}

impl Default for RowStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RowStore {
    pub fn new() -> Self {
        Self {
            table: RwLock::new(RowTable {
                schema: None,
                rows: Vec::new(),
                generation: 0,
            }),
            next_row_id: AtomicU64::new(0),
            minimum_row_count: AtomicUsize::new(0),
            last_modified: RwLock::new(None),
        }
    }

    /// Replace the columns, drop every row and reset the row-id counter
    pub fn initialize(
        &self,
        columns: Vec<ColumnDefinition>,
        minimum_row_count: usize,
    ) -> GridResult<Arc<Schema>> {
        let schema = Arc::new(Schema::new(columns)?);
        {
            let mut table = self.table.write();
            table.schema = Some(Arc::clone(&schema));
            table.rows = Vec::new();
            table.generation += 1;
            self.next_row_id.store(0, Ordering::SeqCst);
            self.minimum_row_count
                .store(minimum_row_count, Ordering::SeqCst);
        }
        self.touch();
        Ok(schema)
    }

    pub fn is_initialized(&self) -> bool {
        self.table.read().schema.is_some()
    }

    pub fn schema(&self) -> GridResult<Arc<Schema>> {
        self.table
            .read()
            .schema
            .clone()
            .ok_or(GridError::NotInitialized)
    }

    pub fn row_count(&self) -> usize {
        self.table.read().rows.len()
    }

    pub fn minimum_row_count(&self) -> usize {
        self.minimum_row_count.load(Ordering::SeqCst)
    }

    pub fn generation(&self) -> u64 {
        self.table.read().generation
    }

    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        *self.last_modified.read()
    }

    /// Point-in-time copy of the row list, taken under a short read lock
    pub fn snapshot(&self) -> GridResult<Snapshot> {
        let table = self.table.read();
        let schema = table.schema.clone().ok_or(GridError::NotInitialized)?;
        Ok(Snapshot {
            schema,
            rows: table.rows.clone(),
            generation: table.generation,
        })
    }

    /// Up to `count` rows starting at `start`; empty past the end
    pub fn range(&self, start: usize, count: usize) -> GridResult<Snapshot> {
        let table = self.table.read();
        let schema = table.schema.clone().ok_or(GridError::NotInitialized)?;
        let end = start.saturating_add(count).min(table.rows.len());
        let rows = table.rows.get(start..end).map(<[_]>::to_vec).unwrap_or_default();
        Ok(Snapshot {
            schema,
            rows,
            generation: table.generation,
        })
    }

    /// Row at `index` together with the generation it was read at
    pub fn get(&self, index: usize) -> GridResult<(Arc<DataRow>, u64)> {
        let table = self.table.read();
        if table.schema.is_none() {
            return Err(GridError::NotInitialized);
        }
        let row = table.rows.get(index).cloned().ok_or(GridError::NotFound {
            index,
            row_count: table.rows.len(),
        })?;
        Ok((row, table.generation))
    }

    /// Run `f` with exclusive access to the rows.
    ///
    /// Generation and last-modified are only updated when `f` changed
    /// something.
    pub fn write_rows<R>(&self, f: impl FnOnce(&mut RowsWriter<'_>) -> R) -> GridResult<R> {
        let mut guard = self.table.write();
        let table = &mut *guard;
        let schema = table.schema.clone().ok_or(GridError::NotInitialized)?;

        let (result, changed) = {
            let mut writer = RowsWriter {
                rows: &mut table.rows,
                ids: &self.next_row_id,
                column_count: schema.len(),
                minimum_row_count: self.minimum_row_count(),
                changed: false,
            };
            let result = f(&mut writer);
            (result, writer.changed)
        };

        if changed {
            table.generation += 1;
        }
        drop(guard);

        if changed {
            self.touch();
        }
        Ok(result)
    }

    /// Release spare capacity. Gives up if the write lock is not free
    /// within `max_wait`.
    pub fn compact(&self, max_wait: Duration) -> bool {
        match self.table.try_write_for(max_wait) {
            Some(mut table) => {
                table.rows.shrink_to_fit();
                true
            }
            None => false,
        }
    }

    /// Rough heap footprint of the row table, for sweep logging
    pub fn estimated_bytes(&self) -> usize {
        let table = self.table.read();
        let columns = table.schema.as_ref().map(|s| s.len()).unwrap_or(0);
        let per_row = std::mem::size_of::<DataRow>() + columns * std::mem::size_of::<CellValue>();
        table.rows.capacity() * std::mem::size_of::<Arc<DataRow>>() + table.rows.len() * per_row
    }

    pub fn state(&self) -> DataGridState {
        let table = self.table.read();
        match &table.schema {
            Some(schema) => DataGridState {
                is_initialized: true,
                row_count: table.rows.len(),
                column_count: schema.len(),
                columns: schema.names(),
                minimum_row_count: self.minimum_row_count(),
                last_modified: self.last_modified(),
            },
            None => DataGridState::default(),
        }
    }

    fn touch(&self) {
        *self.last_modified.write() = Some(Utc::now());
    }
}

// ============================================================================
// Rows Writer
// ============================================================================

/// Exclusive handle over the row vector for one write section
pub struct RowsWriter<'a> {
    rows: &'a mut Vec<Arc<DataRow>>,
    ids: &'a AtomicU64,
    column_count: usize,
    minimum_row_count: usize,
    changed: bool,
}

impl RowsWriter<'_> {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn minimum_row_count(&self) -> usize {
        self.minimum_row_count
    }

    pub fn row(&self, index: usize) -> Option<&Arc<DataRow>> {
        self.rows.get(index)
    }

    fn next_id(&self) -> u64 {
        self.ids.fetch_add(1, Ordering::Relaxed)
    }

    /// Append a row; cells are padded or truncated to the column count
    pub fn push(&mut self, mut cells: Vec<CellValue>) -> usize {
        cells.resize(self.column_count, CellValue::Empty);
        let row = DataRow::new(self.next_id(), cells);
        self.rows.push(Arc::new(row));
        self.changed = true;
        self.rows.len() - 1
    }

    pub fn push_empty(&mut self) -> usize {
        let row = DataRow::empty(self.next_id(), self.column_count);
        self.rows.push(Arc::new(row));
        self.changed = true;
        self.rows.len() - 1
    }

    /// Remove a row, shifting every later row down by one
    pub fn remove(&mut self, index: usize) -> Option<Arc<DataRow>> {
        if index >= self.rows.len() {
            return None;
        }
        self.changed = true;
        Some(self.rows.remove(index))
    }

    /// Replace a row's values, keeping its id and position
    pub fn set(&mut self, index: usize, mut cells: Vec<CellValue>) -> GridResult<()> {
        let row_count = self.rows.len();
        let slot = self
            .rows
            .get_mut(index)
            .ok_or(GridError::NotFound { index, row_count })?;
        cells.resize(self.column_count, CellValue::Empty);
        *slot = Arc::new(DataRow::new(slot.id, cells));
        self.changed = true;
        Ok(())
    }

    /// Replace one cell, keeping the row's id and position
    pub fn set_cell(&mut self, index: usize, position: usize, value: CellValue) -> GridResult<()> {
        let row_count = self.rows.len();
        let slot = self
            .rows
            .get_mut(index)
            .ok_or(GridError::NotFound { index, row_count })?;
        let mut cells = slot.cells.clone();
        cells.resize(self.column_count, CellValue::Empty);
        if position >= cells.len() {
            return Err(GridError::InvalidData(format!(
                "column position {} out of range",
                position
            )));
        }
        cells[position] = value;
        *slot = Arc::new(DataRow::new(slot.id, cells));
        self.changed = true;
        Ok(())
    }

    /// Blank a row's values in place
    pub fn clear_content(&mut self, index: usize) -> bool {
        let column_count = self.column_count;
        match self.rows.get_mut(index) {
            Some(slot) => {
                *slot = Arc::new(DataRow::empty(slot.id, column_count));
                self.changed = true;
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        if !self.rows.is_empty() {
            self.rows.clear();
            self.changed = true;
        }
    }

    /// Keep the first `len` rows and drop the rest
    pub fn truncate(&mut self, len: usize) {
        if len < self.rows.len() {
            self.rows.truncate(len);
            self.changed = true;
        }
    }

    /// Drop empty rows at the tail; returns how many were dropped
    pub fn truncate_trailing_empty(&mut self) -> usize {
        let keep = self
            .rows
            .iter()
            .rposition(|row| !row.is_empty())
            .map(|i| i + 1)
            .unwrap_or(0);
        let dropped = self.rows.len() - keep;
        if dropped > 0 {
            self.rows.truncate(keep);
            self.changed = true;
        }
        dropped
    }

    /// Append empty rows until the row count reaches the minimum floor.
    /// Returns how many rows were appended.
    pub fn ensure_minimum(&mut self) -> usize {
        let floor = minimum_floor(self.minimum_row_count);
        let missing = floor.saturating_sub(self.rows.len());
        for _ in 0..missing {
            self.push_empty();
        }
        missing
    }
}
