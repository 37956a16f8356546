//! Engine-wide defaults.
//!
//! Centralizes the tuning numbers so `GridConfig::default()` and the
//! background timers agree on them.

// ============================================================================
// Row Layout
// ============================================================================

/// Rows kept in the grid even when it holds no data
pub const DEFAULT_MINIMUM_ROW_COUNT: usize = 10;

// ============================================================================
// Import / Export
// ============================================================================

/// Rows per import batch
pub const DEFAULT_BATCH_SIZE: usize = 5_000;

/// Input size above which imports may fan out to the worker pool
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 10_000;

/// Snapshot size above which exports are processed in parallel chunks
pub const DEFAULT_LARGE_EXPORT_THRESHOLD: usize = 10_000;

/// Fallback worker count when the core count cannot be queried
pub const FALLBACK_WORKER_COUNT: usize = 4;

// ============================================================================
// Validation
// ============================================================================

/// Rows per validation batch
pub const DEFAULT_VALIDATION_BATCH_SIZE: usize = 1_000;

/// Pause between validation batches in milliseconds (0 = cooperative yield only)
pub const DEFAULT_VALIDATION_THROTTLE_MS: u64 = 1;

/// Row count above which full validation is skipped
pub const DEFAULT_MAX_ROWS_FOR_FULL_VALIDATION: usize = 100_000;

// ============================================================================
// Cache & Memory
// ============================================================================

/// Maximum entries in the virtualization cache
pub const DEFAULT_CACHE_SIZE: usize = 1_000;

/// Interval between dead-entry prunes of the virtualization cache
pub const DEFAULT_CACHE_CLEANUP_INTERVAL_MS: u64 = 30_000;

/// Interval between aggressive memory sweeps
pub const DEFAULT_MEMORY_CLEANUP_INTERVAL_MS: u64 = 60_000;

/// Longest a background sweep may wait for a lock before skipping its turn
pub const MAX_LOCK_WAIT_MS: u64 = 50;

// ============================================================================
// Notifications & Instrumentation
// ============================================================================

/// Buffered events per broadcast channel before slow receivers start lagging
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Operations slower than this are logged as warnings
pub const SLOW_OPERATION_MS: f64 = 500.0;
