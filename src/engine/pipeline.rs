//! Batch import and export.
//!
//! Imports are split into fixed-size batches. Each batch is converted
//! (and optionally validated) off the store lock, then committed in one
//! short write section, so concurrent readers always see whole batches.
//! Large imports prepare several batches at once on the blocking pool and
//! commit them strictly in input order.
//!
//! Exports work from a snapshot and never take the store lock while
//! converting. Large snapshots are split into one chunk per worker; the
//! chunks are concatenated in order, so output order always matches row
//! order.

use crate::config::GridConfig;
use crate::data::{rows_to_frame, GridError, GridResult, RowStore, Schema, Snapshot};
use crate::engine::cancel::{is_cancelled, CancellationToken};
use crate::engine::memory::run_guarded;
use crate::engine::validation::{check_cells, pause};
use crate::types::{
    BatchProgress, CellValue, ColumnDefinition, DataRow, ImportResult, ProgressCallback, RowDict,
    RowError,
};
use polars::prelude::DataFrame;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

// ============================================================================
// Import
// ============================================================================

/// Per-call import options
#[derive(Clone)]
pub struct ImportOptions {
    /// Overrides `GridConfig::batch_size`
    pub batch_size: Option<usize>,
    /// Overrides `GridConfig::enable_parallel`
    pub enable_parallel: Option<bool>,
    /// Run the column rules on each row before committing it
    pub validate_on_import: bool,
    /// Skip and report invalid rows. When false the first invalid row
    /// aborts the import; batches committed before it stay in the grid.
    pub skip_invalid_rows: bool,
    /// Drop the existing rows when the first batch commits; when false
    /// rows are appended after the last non-empty row. An import that
    /// stops before its first commit leaves the existing rows untouched.
    pub replace_existing: bool,
    pub progress: Option<ProgressCallback>,
    pub cancellation: Option<CancellationToken>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            batch_size: None,
            enable_parallel: None,
            validate_on_import: true,
            skip_invalid_rows: true,
            replace_existing: true,
            progress: None,
            cancellation: None,
        }
    }
}

impl ImportOptions {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn with_parallel(mut self, enabled: bool) -> Self {
        self.enable_parallel = Some(enabled);
        self
    }

    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.validate_on_import = enabled;
        self
    }

    pub fn abort_on_invalid(mut self) -> Self {
        self.skip_invalid_rows = false;
        self
    }

    pub fn append(mut self) -> Self {
        self.replace_existing = false;
        self
    }

    pub fn with_progress<F>(mut self, progress: F) -> Self
    where
        F: Fn(&BatchProgress) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(progress));
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
}

/// A converted batch, ready to commit
#[derive(Debug, Default)]
pub struct PreparedBatch {
    /// Source position of the batch's first row
    pub offset: usize,
    pub rows: Vec<Vec<CellValue>>,
    pub errors: Vec<RowError>,
    pub invalid_rows: usize,
}

impl PreparedBatch {
    pub fn len(&self) -> usize {
        self.rows.len() + self.invalid_rows
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_clean(&self) -> bool {
        self.invalid_rows == 0
    }

    fn reject(&mut self, error: RowError) {
        self.invalid_rows += 1;
        self.errors.push(error);
    }
}

/// Convert and optionally validate one batch. Row errors carry the row's
/// position in the import source.
pub fn prepare_batch(
    schema: &Schema,
    rows: Vec<RowDict>,
    offset: usize,
    validate: bool,
) -> PreparedBatch {
    let mut batch = PreparedBatch {
        offset,
        rows: Vec::with_capacity(rows.len()),
        ..Default::default()
    };

    for (i, values) in rows.into_iter().enumerate() {
        let source_index = offset + i;
        let cells = match schema.to_cells(values) {
            Ok(cells) => cells,
            Err(GridError::UnknownColumn(name)) => {
                batch.reject(RowError::for_column(source_index, &name, "unknown column"));
                continue;
            }
            Err(e) => {
                batch.reject(RowError::new(source_index, e.to_string()));
                continue;
            }
        };

        if validate && !cells.iter().all(CellValue::is_blank) {
            let check = check_cells(schema, &cells, source_index);
            if !check.is_valid() {
                batch.invalid_rows += 1;
                batch.errors.extend(check.errors.into_iter().map(|e| {
                    RowError::for_column(e.row_index, &e.column, e.message)
                }));
                continue;
            }
        }

        batch.rows.push(cells);
    }

    batch
}

struct ImportTally {
    total: usize,
    imported: usize,
    error_rows: usize,
    errors: Vec<RowError>,
    aborted: bool,
    cancelled: bool,
    replace: bool,
    /// Store position of the next imported row, fixed at the first commit
    cursor: Option<usize>,
}

impl ImportTally {
    fn new(total: usize, replace: bool) -> Self {
        Self {
            total,
            imported: 0,
            error_rows: 0,
            errors: Vec::new(),
            aborted: false,
            cancelled: false,
            replace,
            cursor: None,
        }
    }

    fn processed(&self) -> usize {
        self.imported + self.error_rows
    }

    fn stopped(&self) -> bool {
        self.aborted || self.cancelled
    }

    /// A batch could not be prepared; its rows stay unprocessed
    fn fail(&mut self, offset: usize, reason: &str) {
        warn!(offset, reason, "import batch failed, import stopped");
        self.errors.push(RowError::new(
            offset,
            format!("batch preparation failed: {}", reason),
        ));
        self.aborted = true;
    }

    fn report(&self, progress: Option<&ProgressCallback>, start: Instant) {
        if let Some(progress) = progress {
            progress(&BatchProgress {
                processed: self.processed(),
                total: self.total,
                succeeded: self.imported,
                failed: self.error_rows,
                elapsed: start.elapsed(),
            });
        }
    }

    fn into_result(self, duration: Duration) -> ImportResult {
        ImportResult {
            success: !self.aborted,
            total_rows: self.total,
            imported_rows: self.imported,
            error_rows: self.error_rows,
            unprocessed_rows: self.total - self.imported - self.error_rows,
            cancelled: self.cancelled,
            errors: self.errors,
            duration,
        }
    }
}

/// Commit one batch in a single write section. The first commit drops the
/// previous rows (replace) or the trailing blanks (append); every commit
/// first drops the padding left by the one before and pads back up to the
/// floor, so readers never see fewer rows than the floor.
fn commit(
    store: &RowStore,
    batch: PreparedBatch,
    skip_invalid: bool,
    tally: &mut ImportTally,
) -> GridResult<()> {
    let PreparedBatch {
        offset,
        rows,
        errors,
        invalid_rows,
    } = batch;

    if !skip_invalid && invalid_rows > 0 {
        tally.error_rows += invalid_rows;
        tally.errors.extend(errors);
        tally.aborted = true;
        debug!(offset, invalid_rows, "invalid row, import aborted");
        return Ok(());
    }

    let committed = rows.len();
    let replace = tally.replace;
    let cursor = tally.cursor;
    let next = store.write_rows(move |w| {
        let cursor = match cursor {
            Some(cursor) => cursor,
            None if replace => 0,
            None => {
                w.truncate_trailing_empty();
                w.len()
            }
        };
        w.truncate(cursor);
        for cells in rows {
            w.push(cells);
        }
        let next = w.len();
        w.ensure_minimum();
        next
    })?;

    tally.cursor = Some(next);
    tally.imported += committed;
    tally.error_rows += invalid_rows;
    tally.errors.extend(errors);
    debug!(offset, committed, invalid_rows, "batch committed");
    Ok(())
}

/// Import dictionary rows into the store
pub async fn import_rows(
    store: &RowStore,
    config: &GridConfig,
    rows: Vec<RowDict>,
    options: &ImportOptions,
) -> GridResult<ImportResult> {
    let start = Instant::now();
    if rows.is_empty() {
        return Err(GridError::EmptyInput("no rows to import"));
    }

    let schema = store.schema()?;
    let total = rows.len();
    let batch_size = options.batch_size.unwrap_or(config.batch_size).max(1);
    let parallel = config
        .clone()
        .with_parallel(options.enable_parallel.unwrap_or(config.enable_parallel))
        .should_parallelize_import(total);

    let mut tally = ImportTally::new(total, options.replace_existing);
    let source = rows.into_iter();
    let outcome = if parallel {
        import_parallel(store, config, schema, source, batch_size, options, &mut tally, start)
            .await
    } else {
        import_sequential(store, config, &schema, source, batch_size, options, &mut tally, start)
            .await
    };

    store.write_rows(|w| w.ensure_minimum())?;
    outcome?;

    let result = tally.into_result(start.elapsed());
    info!(
        total = result.total_rows,
        imported = result.imported_rows,
        errors = result.error_rows,
        cancelled = result.cancelled,
        success = result.success,
        parallel,
        elapsed_ms = result.duration.as_millis() as u64,
        "import finished"
    );
    Ok(result)
}

#[allow(clippy::too_many_arguments)]
async fn import_sequential(
    store: &RowStore,
    config: &GridConfig,
    schema: &Schema,
    mut source: std::vec::IntoIter<RowDict>,
    batch_size: usize,
    options: &ImportOptions,
    tally: &mut ImportTally,
    start: Instant,
) -> GridResult<()> {
    let mut offset = 0;
    while offset < tally.total {
        if is_cancelled(options.cancellation.as_ref()) {
            tally.cancelled = true;
            break;
        }

        let batch: Vec<RowDict> = source.by_ref().take(batch_size).collect();
        let len = batch.len();
        let validate = options.validate_on_import;
        match run_guarded("import_batch", || prepare_batch(schema, batch, offset, validate)) {
            Some(prepared) => commit(store, prepared, options.skip_invalid_rows, tally)?,
            None => tally.fail(offset, "row conversion panicked"),
        }
        offset += len;
        tally.report(options.progress.as_ref(), start);

        if tally.stopped() {
            break;
        }
        if offset < tally.total {
            pause(config.pacing_interval()).await;
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn import_parallel(
    store: &RowStore,
    config: &GridConfig,
    schema: Arc<Schema>,
    mut source: std::vec::IntoIter<RowDict>,
    batch_size: usize,
    options: &ImportOptions,
    tally: &mut ImportTally,
    start: Instant,
) -> GridResult<()> {
    let workers = config.worker_count();
    let validate = options.validate_on_import;
    let mut offset = 0;

    debug!(workers, batch_size, total = tally.total, "parallel import");

    while offset < tally.total && !tally.stopped() {
        if is_cancelled(options.cancellation.as_ref()) {
            tally.cancelled = true;
            break;
        }

        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let batch: Vec<RowDict> = source.by_ref().take(batch_size).collect();
            if batch.is_empty() {
                break;
            }
            let len = batch.len();
            let schema = Arc::clone(&schema);
            let batch_offset = offset;
            let handle = tokio::task::spawn_blocking(move || {
                run_guarded("import_batch", || {
                    prepare_batch(&schema, batch, batch_offset, validate)
                })
            });
            handles.push((batch_offset, handle));
            offset += len;
        }

        // Commit in input order; after a stop the rest are drained unused
        for (batch_offset, handle) in handles {
            let prepared = match handle.await {
                Ok(Some(prepared)) => prepared,
                Ok(None) => {
                    if !tally.stopped() {
                        tally.fail(batch_offset, "row conversion panicked");
                    }
                    continue;
                }
                Err(e) => {
                    if !tally.stopped() {
                        tally.fail(batch_offset, &e.to_string());
                    }
                    continue;
                }
            };
            if tally.stopped() {
                continue;
            }
            if is_cancelled(options.cancellation.as_ref()) {
                tally.cancelled = true;
                continue;
            }
            commit(store, prepared, options.skip_invalid_rows, tally)?;
            tally.report(options.progress.as_ref(), start);
        }
    }
    Ok(())
}

// ============================================================================
// Export
// ============================================================================

/// Per-call export options
#[derive(Clone, Default)]
pub struct ExportOptions {
    /// Include rows whose values are all blank
    pub include_empty_rows: bool,
    /// Restrict output to these columns, in this order
    pub columns: Option<Vec<String>>,
    /// Drop rows that fail validation
    pub only_valid_rows: bool,
    pub cancellation: Option<CancellationToken>,
}

impl ExportOptions {
    pub fn with_empty_rows(mut self) -> Self {
        self.include_empty_rows = true;
        self
    }

    pub fn with_columns<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn only_valid(mut self) -> Self {
        self.only_valid_rows = true;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
}

#[derive(Clone)]
struct ExportFilter {
    positions: Vec<usize>,
    include_empty: bool,
    only_valid: bool,
}

impl ExportFilter {
    fn new(schema: &Schema, options: &ExportOptions) -> GridResult<Self> {
        let positions = match &options.columns {
            Some(names) => schema.resolve(names)?,
            None => (0..schema.len()).collect(),
        };
        Ok(Self {
            positions,
            include_empty: options.include_empty_rows,
            only_valid: options.only_valid_rows,
        })
    }

    fn keeps(&self, schema: &Schema, row: &DataRow) -> bool {
        if !self.include_empty && row.is_empty() {
            return false;
        }
        !self.only_valid || check_cells(schema, &row.cells, 0).is_valid()
    }
}

fn export_chunk(schema: &Schema, rows: &[Arc<DataRow>], filter: &ExportFilter) -> Vec<RowDict> {
    rows.iter()
        .filter(|row| filter.keeps(schema, row))
        .map(|row| schema.project(row, &filter.positions))
        .collect()
}

fn check_cancel(token: Option<&CancellationToken>) -> GridResult<()> {
    match token {
        Some(token) => token.check(),
        None => Ok(()),
    }
}

/// Export a snapshot as dictionary rows, in row order
pub async fn export_rows(
    snapshot: Snapshot,
    config: &GridConfig,
    options: &ExportOptions,
) -> GridResult<Vec<RowDict>> {
    let start = Instant::now();
    let filter = ExportFilter::new(&snapshot.schema, options)?;
    let token = options.cancellation.as_ref();
    let total = snapshot.len();
    let parallel = config.should_parallelize_export(total);

    check_cancel(token)?;
    let mut out = Vec::with_capacity(total);

    if parallel {
        let chunk_size = total.div_ceil(config.worker_count()).max(1);
        let handles: Vec<_> = snapshot
            .rows
            .chunks(chunk_size)
            .map(|chunk| {
                let rows = chunk.to_vec();
                let schema = Arc::clone(&snapshot.schema);
                let filter = filter.clone();
                tokio::task::spawn_blocking(move || export_chunk(&schema, &rows, &filter))
            })
            .collect();

        for handle in handles {
            let part = handle.await?;
            check_cancel(token)?;
            out.extend(part);
        }
    } else {
        let chunk_size = config.batch_size.max(1);
        for chunk in snapshot.rows.chunks(chunk_size) {
            check_cancel(token)?;
            out.extend(export_chunk(&snapshot.schema, chunk, &filter));
            if chunk.len() == chunk_size {
                tokio::task::yield_now().await;
            }
        }
    }

    debug!(
        rows = total,
        exported = out.len(),
        parallel,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "export finished"
    );
    Ok(out)
}

/// Export a snapshot as a typed data frame
pub async fn export_frame(
    snapshot: Snapshot,
    config: &GridConfig,
    options: &ExportOptions,
) -> GridResult<DataFrame> {
    let filter = ExportFilter::new(&snapshot.schema, options)?;
    let columns: Vec<ColumnDefinition> = filter
        .positions
        .iter()
        .map(|&i| snapshot.schema.columns()[i].clone())
        .collect();
    let rows = export_rows(snapshot, config, options).await?;
    rows_to_frame(&columns, &rows)
}
