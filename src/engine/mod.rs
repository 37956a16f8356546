//! Grid engine facade.
//!
//! `GridEngine` owns the row store, the virtualization cache, the change
//! bus and the background timers. Structural operations (initialize,
//! import, delete, clear, add/set/update) are serialized through a single
//! async gate and each publishes exactly one `DataChangeEvent`. Reads
//! (get, export, validate, state) work from snapshots and never wait on
//! the gate.
//!
//! ## Usage
//!
//! ```ignore
//! let engine = GridEngine::new(GridConfig::default())?;
//! engine
//!     .initialize(vec![ColumnDefinition::text("Name")], GridConfig::default())
//!     .await?;
//! let result = engine.import_json(json, ImportOptions::default()).await?;
//! ```

pub mod cache;
pub mod cancel;
pub mod events;
pub mod memory;
pub mod pipeline;
pub mod smart_delete;
pub mod validation;

pub use cache::{CacheStats, VirtualizationCache};
pub use cancel::CancellationToken;
pub use events::{
    ChangeBus, DataChangeEvent, DataChangeKind, Subscription, ValidationChangeEvent,
};
pub use memory::{MemoryManager, SweepReport};
pub use pipeline::{ExportOptions, ImportOptions};
pub use smart_delete::DeleteAction;
pub use validation::{ValidationBatcher, ValidationOptions};

use crate::config::GridConfig;
use crate::data::{
    frame_to_rows, minimum_floor, parse_json_rows, read_csv, rows_to_json_value, write_csv,
    GridError, GridResult, RowStore,
};
use crate::perf::{OperationMetrics, OperationStats, OperationSummary, ScopedTimer};
use crate::types::{
    CellValue, ColumnDefinition, DataGridState, DeleteResult, ImportResult, Row, RowDict,
    ValidationResult,
};
use parking_lot::{Mutex, RwLock};
use polars::prelude::DataFrame;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct GridEngine {
    id: Uuid,
    config: RwLock<GridConfig>,
    store: Arc<RowStore>,
    cache: Arc<VirtualizationCache>,
    bus: ChangeBus,
    /// Serializes structural mutations
    gate: tokio::sync::Mutex<()>,
    metrics: OperationMetrics,
    timers: Mutex<Option<MemoryManager>>,
}

impl GridEngine {
    /// Create an engine. Background timers start if called inside a tokio
    /// runtime.
    pub fn new(config: GridConfig) -> GridResult<Self> {
        config.validate()?;
        let engine = Self {
            id: Uuid::new_v4(),
            cache: Arc::new(VirtualizationCache::new(config.cache_size)),
            config: RwLock::new(config),
            store: Arc::new(RowStore::new()),
            bus: ChangeBus::new(),
            gate: tokio::sync::Mutex::new(()),
            metrics: OperationMetrics::new(),
            timers: Mutex::new(None),
        };
        engine.restart_timers();
        debug!(engine = %engine.id, "engine created");
        Ok(engine)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> GridConfig {
        self.config.read().clone()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Replace columns and configuration, dropping every row. The grid is
    /// padded with empty rows up to the minimum floor.
    pub async fn initialize(
        &self,
        columns: Vec<ColumnDefinition>,
        config: GridConfig,
    ) -> GridResult<bool> {
        self.timed("initialize", async {
            config.validate()?;
            let _gate = self.gate.lock().await;

            self.store.initialize(columns, config.minimum_row_count)?;
            self.store.write_rows(|w| w.ensure_minimum())?;
            self.cache.reset(config.cache_size);
            *self.config.write() = config;
            self.restart_timers();

            let state = self.store.state();
            info!(
                engine = %self.id,
                columns = state.column_count,
                minimum_rows = state.minimum_row_count,
                "grid initialized"
            );
            self.publish(DataChangeKind::Initialized, Vec::new());
            Ok(true)
        })
        .await
    }

    /// Stop the background timers and drop cached entries
    pub fn shutdown(&self) {
        if let Some(mut timers) = self.timers.lock().take() {
            timers.stop();
        }
        self.cache.clear();
        self.metrics.log_slow_operations();
        info!(engine = %self.id, "engine shut down");
    }

    fn restart_timers(&self) {
        let config = self.config();
        let mut timers = self.timers.lock();
        timers.take();
        match MemoryManager::start(Arc::clone(&self.store), Arc::clone(&self.cache), &config) {
            Ok(manager) => *timers = Some(manager),
            Err(GridError::NoRuntime) => {
                debug!(engine = %self.id, "no runtime, background timers not started");
            }
            Err(e) => warn!(engine = %self.id, error = %e, "background timers not started"),
        }
    }

    pub fn timers_running(&self) -> bool {
        self.timers
            .lock()
            .as_ref()
            .map(MemoryManager::is_running)
            .unwrap_or(false)
    }

    // ========================================================================
    // Import
    // ========================================================================

    pub async fn import_rows(
        &self,
        rows: Vec<RowDict>,
        options: ImportOptions,
    ) -> GridResult<ImportResult> {
        self.timed("import", async {
            let _gate = self.gate.lock().await;
            let config = self.config();
            let generation = self.store.generation();
            let result = pipeline::import_rows(&self.store, &config, rows, &options).await;
            // Batches committed before a failure are still a change
            if result.is_ok() || self.store.generation() != generation {
                self.publish(DataChangeKind::Imported, Vec::new());
            }
            result
        })
        .await
    }

    /// Import every row of a polars frame; columns are matched by name
    pub async fn import_table(
        &self,
        frame: &DataFrame,
        options: ImportOptions,
    ) -> GridResult<ImportResult> {
        self.import_rows(frame_to_rows(frame), options).await
    }

    /// Import a JSON array of objects (or an object wrapping one)
    pub async fn import_json(&self, json: &str, options: ImportOptions) -> GridResult<ImportResult> {
        let rows = parse_json_rows(json)?;
        self.import_rows(rows, options).await
    }

    /// Import a CSV file (tab separated for `.tsv`)
    pub async fn import_csv(&self, path: &Path, options: ImportOptions) -> GridResult<ImportResult> {
        let frame = read_csv(path)?;
        self.import_table(&frame, options).await
    }

    // ========================================================================
    // Structural Edits
    // ========================================================================

    /// Remove or blank the given rows, keeping the grid at its minimum floor
    pub async fn smart_delete(&self, indices: &[usize]) -> GridResult<DeleteResult> {
        self.timed("smart_delete", async {
            if indices.is_empty() {
                return Err(GridError::EmptyInput("no rows to delete"));
            }
            let start = Instant::now();
            let _gate = self.gate.lock().await;

            let plan = self
                .store
                .write_rows(|w| smart_delete::apply(w, indices))?;
            let mut result = plan.result;
            result.duration = start.elapsed();

            debug!(
                requested = result.requested_count,
                deleted = result.deleted_count,
                cleared = result.cleared_count,
                appended = result.appended_count,
                errors = result.errors.len(),
                "smart delete"
            );
            self.publish(DataChangeKind::Deleted, plan.affected);
            Ok(result)
        })
        .await
    }

    /// Drop all data, leaving the minimum floor of empty rows. Clearing an
    /// already clear grid changes nothing.
    pub async fn clear(&self) -> GridResult<bool> {
        self.timed("clear", async {
            let _gate = self.gate.lock().await;
            self.store.write_rows(|w| {
                let floor = minimum_floor(w.minimum_row_count());
                let already_clear = w.len() == floor
                    && (0..w.len()).all(|i| w.row(i).map(|r| r.is_empty()).unwrap_or(true));
                if !already_clear {
                    w.clear();
                    w.ensure_minimum();
                }
            })?;
            self.publish(DataChangeKind::Cleared, Vec::new());
            Ok(true)
        })
        .await
    }

    /// Append a row after the last non-empty row; returns its index
    pub async fn add_row(&self, values: RowDict) -> GridResult<usize> {
        self.timed("add_row", async {
            let _gate = self.gate.lock().await;
            let cells = self.store.schema()?.to_cells(values)?;
            let index = self.store.write_rows(|w| {
                w.truncate_trailing_empty();
                let index = w.push(cells);
                w.ensure_minimum();
                index
            })?;
            self.publish(DataChangeKind::RowAdded, vec![index]);
            Ok(index)
        })
        .await
    }

    /// Replace every value of a row; missing columns become empty
    pub async fn set_row(&self, index: usize, values: RowDict) -> GridResult<()> {
        self.timed("set_row", async {
            let _gate = self.gate.lock().await;
            let cells = self.store.schema()?.to_cells(values)?;
            self.store.write_rows(|w| w.set(index, cells))??;
            self.publish(DataChangeKind::RowUpdated, vec![index]);
            Ok(())
        })
        .await
    }

    /// Replace one value. Re-validates the row when realtime validation is
    /// on and the grid is within the validation ceiling.
    pub async fn update_cell(
        &self,
        index: usize,
        column: &str,
        value: CellValue,
    ) -> GridResult<()> {
        self.timed("update_cell", async {
            {
                let _gate = self.gate.lock().await;
                let schema = self.store.schema()?;
                let position = schema
                    .position(column)
                    .ok_or_else(|| GridError::UnknownColumn(column.to_string()))?;
                let value = value.coerce(schema.columns()[position].data_type);
                self.store
                    .write_rows(|w| w.set_cell(index, position, value))??;
                self.publish(DataChangeKind::CellUpdated, vec![index]);
            }

            let config = self.config();
            if config.enable_realtime_validation
                && ValidationBatcher::from_config(&config).within_ceiling(self.store.row_count())
            {
                self.validate_row(index)?;
            }
            Ok(())
        })
        .await
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn get_row(&self, index: usize) -> GridResult<Row> {
        let schema = self.store.schema()?;
        if let Some(row) = self.cache.get(index, self.store.generation()) {
            return Ok(schema.to_row(index, &row));
        }
        let (row, generation) = self.store.get(index)?;
        self.cache.insert(index, &row, generation);
        Ok(schema.to_row(index, &row))
    }

    /// Up to `count` rows starting at `start`, for a visible window
    pub fn get_rows(&self, start: usize, count: usize) -> GridResult<Vec<Row>> {
        let window = self.store.range(start, count)?;
        Ok(window
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                self.cache.insert(start + i, row, window.generation);
                window.schema.to_row(start + i, row)
            })
            .collect())
    }

    pub async fn export(&self, options: ExportOptions) -> GridResult<Vec<RowDict>> {
        self.timed("export", async {
            let snapshot = self.store.snapshot()?;
            pipeline::export_rows(snapshot, &self.config(), &options).await
        })
        .await
    }

    pub async fn export_to_table(&self, options: ExportOptions) -> GridResult<DataFrame> {
        self.timed("export_to_table", async {
            let snapshot = self.store.snapshot()?;
            pipeline::export_frame(snapshot, &self.config(), &options).await
        })
        .await
    }

    pub async fn export_json(&self, options: ExportOptions) -> GridResult<serde_json::Value> {
        let rows = self.export(options).await?;
        Ok(rows_to_json_value(&rows))
    }

    /// Write the exported rows to a CSV file
    pub async fn export_csv(&self, path: &Path, options: ExportOptions) -> GridResult<usize> {
        let mut frame = self.export_to_table(options).await?;
        write_csv(&mut frame, path)?;
        Ok(frame.height())
    }

    // ========================================================================
    // Validation
    // ========================================================================

    /// Validate every non-empty row in batches
    pub async fn validate_all(&self, options: ValidationOptions) -> GridResult<ValidationResult> {
        self.timed("validate_all", async {
            let snapshot = self.store.snapshot()?;
            let batcher = ValidationBatcher::from_config(&self.config());
            let result = batcher.validate(&snapshot, &options).await?;
            self.bus.publish_validation(ValidationChangeEvent {
                affected_row: None,
                result: Arc::new(result.clone()),
            });
            Ok(result)
        })
        .await
    }

    pub fn validate_row(&self, index: usize) -> GridResult<ValidationResult> {
        let schema = self.store.schema()?;
        let (row, _) = self.store.get(index)?;
        let result = validation::validate_row(&schema, &row, index);
        self.bus.publish_validation(ValidationChangeEvent {
            affected_row: Some(index),
            result: Arc::new(result.clone()),
        });
        Ok(result)
    }

    // ========================================================================
    // State & Notifications
    // ========================================================================

    pub fn state(&self) -> DataGridState {
        self.store.state()
    }

    pub fn row_count(&self) -> usize {
        self.store.row_count()
    }

    pub fn is_initialized(&self) -> bool {
        self.store.is_initialized()
    }

    pub fn data_changes(&self) -> broadcast::Receiver<DataChangeEvent> {
        self.bus.data_changes()
    }

    pub fn validation_changes(&self) -> broadcast::Receiver<ValidationChangeEvent> {
        self.bus.validation_changes()
    }

    pub fn on_data_change<F>(&self, callback: F) -> GridResult<Subscription>
    where
        F: Fn(&DataChangeEvent) + Send + Sync + 'static,
    {
        self.bus.on_data_change(callback)
    }

    pub fn on_validation_change<F>(&self, callback: F) -> GridResult<Subscription>
    where
        F: Fn(&ValidationChangeEvent) + Send + Sync + 'static,
    {
        self.bus.on_validation_change(callback)
    }

    fn publish(&self, kind: DataChangeKind, affected_indices: Vec<usize>) {
        self.bus.publish_data(DataChangeEvent::new(
            kind,
            affected_indices,
            self.store.row_count(),
        ));
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Run one aggressive memory sweep now
    pub fn run_memory_sweep(&self) -> SweepReport {
        memory::memory_sweep(&self.store, &self.cache)
    }

    pub fn operation_stats(&self, name: &str) -> Option<OperationStats> {
        self.metrics.get(name)
    }

    pub fn operation_summaries(&self) -> Vec<OperationSummary> {
        self.metrics.summaries()
    }

    async fn timed<T>(
        &self,
        name: &'static str,
        operation: impl Future<Output = GridResult<T>>,
    ) -> GridResult<T> {
        let timer = ScopedTimer::with_default_threshold(name);
        let result = operation.await;
        self.metrics.record(name, timer.elapsed_ms(), result.is_ok());
        if let Err(e) = &result {
            debug!(operation = name, error = %e, "operation failed");
        }
        result
    }
}

impl Drop for GridEngine {
    fn drop(&mut self) {
        if let Some(mut timers) = self.timers.lock().take() {
            timers.stop();
        }
    }
}
