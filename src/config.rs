//! Engine configuration.
//!
//! Every field is optional in serialized form and falls back to the
//! defaults in [`crate::constants`]. The config is fixed per
//! `GridEngine::initialize` call.

use crate::constants::*;
use crate::data::{GridError, GridResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Tunables for the row store, pipelines, validation and background timers
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Rows kept in the grid even when it holds no data
    pub minimum_row_count: usize,
    /// Rows per import batch
    pub batch_size: usize,
    /// Allow imports to fan out to the worker pool
    pub enable_parallel: bool,
    /// Input size above which parallel import kicks in
    pub parallel_threshold: usize,
    /// Worker cap for parallel batches (0 = available cores)
    pub max_workers: usize,
    /// Pause between sequential import batches (0 = cooperative yield)
    pub pacing_interval_ms: u64,
    /// Allow large exports to run in parallel chunks
    pub enable_background_processing: bool,
    /// Snapshot size above which exports are chunked in parallel
    pub large_export_threshold: usize,
    /// Rows per validation batch
    pub validation_batch_size: usize,
    /// Pause between validation batches (0 = cooperative yield)
    pub validation_throttle_ms: u64,
    /// Row count above which full validation returns a vacuous success
    pub max_rows_for_full_validation: usize,
    /// Re-validate rows touched by `update_cell`
    pub enable_realtime_validation: bool,
    /// Maximum entries in the virtualization cache
    pub cache_size: usize,
    /// Interval between dead-entry prunes of the cache
    pub cache_cleanup_interval_ms: u64,
    /// Interval between aggressive memory sweeps
    pub memory_cleanup_interval_ms: u64,
    /// Run the periodic memory sweep
    pub aggressive_memory_mode: bool,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            minimum_row_count: DEFAULT_MINIMUM_ROW_COUNT,
            batch_size: DEFAULT_BATCH_SIZE,
            enable_parallel: true,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
            max_workers: 0,
            pacing_interval_ms: 0,
            enable_background_processing: true,
            large_export_threshold: DEFAULT_LARGE_EXPORT_THRESHOLD,
            validation_batch_size: DEFAULT_VALIDATION_BATCH_SIZE,
            validation_throttle_ms: DEFAULT_VALIDATION_THROTTLE_MS,
            max_rows_for_full_validation: DEFAULT_MAX_ROWS_FOR_FULL_VALIDATION,
            enable_realtime_validation: true,
            cache_size: DEFAULT_CACHE_SIZE,
            cache_cleanup_interval_ms: DEFAULT_CACHE_CLEANUP_INTERVAL_MS,
            memory_cleanup_interval_ms: DEFAULT_MEMORY_CLEANUP_INTERVAL_MS,
            aggressive_memory_mode: false,
        }
    }
}

impl GridConfig {
    /// Parse a config from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> GridResult<Self> {
        let config: GridConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config from a JSON file
    pub fn load(path: &Path) -> GridResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> GridResult<()> {
        let checks: [(bool, &str); 6] = [
            (self.batch_size == 0, "batch_size must be greater than 0"),
            (
                self.validation_batch_size == 0,
                "validation_batch_size must be greater than 0",
            ),
            (self.cache_size == 0, "cache_size must be greater than 0"),
            (
                self.cache_cleanup_interval_ms == 0,
                "cache_cleanup_interval_ms must be greater than 0",
            ),
            (
                self.memory_cleanup_interval_ms == 0,
                "memory_cleanup_interval_ms must be greater than 0",
            ),
            (
                self.large_export_threshold == 0,
                "large_export_threshold must be greater than 0",
            ),
        ];
        match checks.iter().find(|(failed, _)| *failed) {
            Some((_, message)) => Err(GridError::InvalidConfig(message.to_string())),
            None => Ok(()),
        }
    }

    /// Effective worker count for parallel batches
    pub fn worker_count(&self) -> usize {
        if self.max_workers > 0 {
            return self.max_workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(FALLBACK_WORKER_COUNT)
    }

    /// Should an import of this many rows use the worker pool?
    pub fn should_parallelize_import(&self, num_rows: usize) -> bool {
        self.enable_parallel && num_rows > self.parallel_threshold && self.worker_count() > 1
    }

    /// Should an export over this many rows use the worker pool?
    pub fn should_parallelize_export(&self, num_rows: usize) -> bool {
        self.enable_background_processing
            && num_rows > self.large_export_threshold
            && self.worker_count() > 1
    }

    pub fn pacing_interval(&self) -> Duration {
        Duration::from_millis(self.pacing_interval_ms)
    }

    pub fn validation_throttle(&self) -> Duration {
        Duration::from_millis(self.validation_throttle_ms)
    }

    pub fn cache_cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cache_cleanup_interval_ms)
    }

    pub fn memory_cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.memory_cleanup_interval_ms)
    }

    pub fn with_minimum_row_count(mut self, minimum: usize) -> Self {
        self.minimum_row_count = minimum;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_parallel(mut self, enabled: bool) -> Self {
        self.enable_parallel = enabled;
        self
    }

    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    pub fn with_max_workers(mut self, workers: usize) -> Self {
        self.max_workers = workers;
        self
    }

    pub fn with_background_processing(mut self, enabled: bool) -> Self {
        self.enable_background_processing = enabled;
        self
    }

    pub fn with_large_export_threshold(mut self, threshold: usize) -> Self {
        self.large_export_threshold = threshold;
        self
    }

    pub fn with_validation_batch_size(mut self, batch_size: usize) -> Self {
        self.validation_batch_size = batch_size;
        self
    }

    pub fn with_validation_throttle_ms(mut self, ms: u64) -> Self {
        self.validation_throttle_ms = ms;
        self
    }

    pub fn with_max_rows_for_full_validation(mut self, rows: usize) -> Self {
        self.max_rows_for_full_validation = rows;
        self
    }

    pub fn with_realtime_validation(mut self, enabled: bool) -> Self {
        self.enable_realtime_validation = enabled;
        self
    }

    pub fn with_cache_size(mut self, size: usize) -> Self {
        self.cache_size = size;
        self
    }

    pub fn with_cleanup_intervals(mut self, cache_ms: u64, memory_ms: u64) -> Self {
        self.cache_cleanup_interval_ms = cache_ms;
        self.memory_cleanup_interval_ms = memory_ms;
        self
    }

    pub fn with_aggressive_memory_mode(mut self, enabled: bool) -> Self {
        self.aggressive_memory_mode = enabled;
        self
    }
}
