//! Operation timing.
//!
//! Every public engine operation records its duration and outcome into
//! `OperationMetrics`. Slow operations are logged as warnings with the
//! operation name and elapsed time as structured fields.

use crate::constants::SLOW_OPERATION_MS;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::time::Instant;
use tracing::{debug, warn};

/// Number of samples to keep for operation statistics
const STATS_SAMPLE_COUNT: usize = 100;

// ============================================================================
// Operation Statistics
// ============================================================================

/// Statistics for a specific operation type.
#[derive(Debug, Clone)]
pub struct OperationStats {
    /// Recent timing samples in milliseconds
    samples: VecDeque<f64>,
    /// Total invocation count
    count: u64,
    /// Invocations that returned an error
    failures: u64,
    /// Minimum observed time
    min_ms: f64,
    /// Maximum observed time
    max_ms: f64,
    /// Running sum of the retained samples
    sum_ms: f64,
}

impl Default for OperationStats {
    fn default() -> Self {
        Self {
            samples: VecDeque::with_capacity(STATS_SAMPLE_COUNT),
            count: 0,
            failures: 0,
            min_ms: f64::MAX,
            max_ms: 0.0,
            sum_ms: 0.0,
        }
    }
}

impl OperationStats {
    /// Record a new timing sample.
    pub fn record(&mut self, ms: f64, ok: bool) {
        if self.samples.len() >= STATS_SAMPLE_COUNT {
            if let Some(old) = self.samples.pop_front() {
                self.sum_ms -= old;
            }
        }
        self.samples.push_back(ms);
        self.sum_ms += ms;
        self.count += 1;
        if !ok {
            self.failures += 1;
        }
        self.min_ms = self.min_ms.min(ms);
        self.max_ms = self.max_ms.max(ms);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }

    pub fn min_ms(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.min_ms
        }
    }

    pub fn max_ms(&self) -> f64 {
        self.max_ms
    }

    /// Get the average time over recent samples.
    pub fn average(&self) -> f64 {
        if self.samples.is_empty() {
            0.0
        } else {
            self.sum_ms / self.samples.len() as f64
        }
    }

    /// Get the p95 (95th percentile) time.
    pub fn p95(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let mut sorted: Vec<f64> = self.samples.iter().copied().collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let idx = ((sorted.len() as f64) * 0.95).floor() as usize;
        sorted.get(idx.min(sorted.len() - 1)).copied().unwrap_or(0.0)
    }
}

/// Serializable view of one operation's statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationSummary {
    pub name: &'static str,
    pub count: u64,
    pub failures: u64,
    pub average_ms: f64,
    pub p95_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
}

/// Per-operation statistics shared by the engine
#[derive(Default)]
pub struct OperationMetrics {
    stats: Mutex<HashMap<&'static str, OperationStats>>,
}

impl OperationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, name: &'static str, elapsed_ms: f64, ok: bool) {
        self.stats.lock().entry(name).or_default().record(elapsed_ms, ok);
    }

    pub fn get(&self, name: &str) -> Option<OperationStats> {
        self.stats.lock().get(name).cloned()
    }

    /// Summaries sorted by name
    pub fn summaries(&self) -> Vec<OperationSummary> {
        let stats = self.stats.lock();
        let mut summaries: Vec<OperationSummary> = stats
            .iter()
            .map(|(name, s)| OperationSummary {
                name,
                count: s.count,
                failures: s.failures,
                average_ms: s.average(),
                p95_ms: s.p95(),
                min_ms: s.min_ms(),
                max_ms: s.max_ms,
            })
            .collect();
        summaries.sort_by_key(|s| s.name);
        summaries
    }

    /// Log the slowest operations at debug level.
    pub fn log_slow_operations(&self) {
        let mut summaries = self.summaries();
        summaries.sort_by(|a, b| {
            b.average_ms
                .partial_cmp(&a.average_ms)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        for s in summaries.iter().take(5) {
            debug!(
                operation = s.name,
                avg_ms = format!("{:.2}", s.average_ms),
                p95_ms = format!("{:.2}", s.p95_ms),
                max_ms = format!("{:.2}", s.max_ms),
                count = s.count,
                "operation timing"
            );
        }
    }
}

// ============================================================================
// Scoped Timer
// ============================================================================

/// A scoped timer that logs a warning on drop when over its threshold.
pub struct ScopedTimer {
    name: &'static str,
    start: Instant,
    threshold_ms: f64,
}

impl ScopedTimer {
    pub fn new(name: &'static str, threshold_ms: f64) -> Self {
        Self {
            name,
            start: Instant::now(),
            threshold_ms,
        }
    }

    /// Timer with the engine's slow-operation threshold
    pub fn with_default_threshold(name: &'static str) -> Self {
        Self::new(name, SLOW_OPERATION_MS)
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Drop for ScopedTimer {
    fn drop(&mut self) {
        let elapsed_ms = self.elapsed_ms();
        if elapsed_ms > self.threshold_ms {
            warn!(
                operation = self.name,
                elapsed_ms = format!("{:.2}", elapsed_ms),
                threshold_ms = format!("{:.2}", self.threshold_ms),
                "Slow operation"
            );
        }
    }
}
