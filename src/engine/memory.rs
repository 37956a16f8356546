//! Background memory manager.
//!
//! Two tokio interval tasks: a cache cleanup that prunes dead entries, and
//! (in aggressive memory mode) a sweep that also shrinks the cache and
//! compacts the row store. Neither task takes the engine's structural
//! gate, and the store compaction gives up rather than wait on a busy
//! write lock. A panicking sweep is logged and the timer keeps going.

use crate::config::GridConfig;
use crate::constants::MAX_LOCK_WAIT_MS;
use crate::data::{GridError, GridResult, RowStore};
use crate::engine::cache::VirtualizationCache;
use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// What one sweep did
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SweepReport {
    pub pruned_entries: usize,
    pub evicted_entries: usize,
    /// False when the store was busy and compaction was skipped
    pub store_compacted: bool,
    pub estimated_store_bytes: usize,
    pub duration: Duration,
}

/// Run `f`, logging and swallowing a panic
pub fn run_guarded<T>(stage: &str, f: impl FnOnce() -> T) -> Option<T> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => Some(result),
        Err(payload) => {
            let message = if let Some(s) = payload.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = payload.downcast_ref::<String>() {
                s.clone()
            } else {
                "<non-string panic payload>".to_string()
            };
            error!(stage, panic_message = %message, "background task panicked");
            None
        }
    }
}

/// Prune cache entries that no longer point at current rows
pub fn cache_cleanup(store: &RowStore, cache: &VirtualizationCache) -> usize {
    let pruned = cache.prune_dead(store.generation());
    if pruned > 0 {
        debug!(pruned, remaining = cache.len(), "cache cleanup");
    }
    pruned
}

/// Prune and halve the cache, then compact the store
pub fn memory_sweep(store: &RowStore, cache: &VirtualizationCache) -> SweepReport {
    let start = Instant::now();
    let pruned_entries = cache.prune_dead(store.generation());
    let evicted_entries = cache.shrink(cache.capacity() / 2);
    let store_compacted = store.compact(Duration::from_millis(MAX_LOCK_WAIT_MS));

    let report = SweepReport {
        pruned_entries,
        evicted_entries,
        store_compacted,
        estimated_store_bytes: store.estimated_bytes(),
        duration: start.elapsed(),
    };

    debug!(
        pruned = report.pruned_entries,
        evicted = report.evicted_entries,
        compacted = report.store_compacted,
        store_bytes = report.estimated_store_bytes,
        "memory sweep"
    );
    report
}

/// Owner of the background timers. Dropping it stops them.
pub struct MemoryManager {
    handles: Vec<JoinHandle<()>>,
}

impl MemoryManager {
    /// Start the timers on the current tokio runtime
    pub fn start(
        store: Arc<RowStore>,
        cache: Arc<VirtualizationCache>,
        config: &GridConfig,
    ) -> GridResult<Self> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| GridError::NoRuntime)?;
        let mut handles = Vec::with_capacity(2);

        {
            let store = Arc::clone(&store);
            let cache = Arc::clone(&cache);
            handles.push(runtime.spawn(run_every(
                config.cache_cleanup_interval(),
                move || {
                    run_guarded("cache_cleanup", || cache_cleanup(&store, &cache));
                },
            )));
        }

        if config.aggressive_memory_mode {
            handles.push(runtime.spawn(run_every(
                config.memory_cleanup_interval(),
                move || {
                    run_guarded("memory_sweep", || memory_sweep(&store, &cache));
                },
            )));
        }

        info!(
            cache_interval_ms = config.cache_cleanup_interval_ms,
            memory_interval_ms = config.memory_cleanup_interval_ms,
            aggressive = config.aggressive_memory_mode,
            "memory manager started"
        );
        Ok(Self { handles })
    }

    pub fn is_running(&self) -> bool {
        self.handles.iter().any(|h| !h.is_finished())
    }

    pub fn stop(&mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }
}

impl Drop for MemoryManager {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_every(period: Duration, mut tick: impl FnMut() + Send + 'static) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // First tick completes immediately
    ticker.tick().await;
    loop {
        ticker.tick().await;
        tick();
    }
}
