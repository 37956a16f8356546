//! Virtualization cache.
//!
//! Maps row index to a weak reference of the stored row so a scrolling
//! view can re-read visible rows without touching the store lock. Entries
//! never keep a row alive. An entry is a hit only if its row is still
//! alive and it was recorded at the store's current generation, so a
//! stale entry can never be served regardless of when cleanup runs.

use crate::types::DataRow;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

struct CacheEntry {
    row: Weak<DataRow>,
    generation: u64,
    /// Logical access time; larger is more recent
    last_access: u64,
}

/// Counters exposed for diagnostics
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub pruned: u64,
}

/// Bounded index-to-row cache holding weak references
pub struct VirtualizationCache {
    capacity: AtomicUsize,
    entries: Mutex<HashMap<usize, CacheEntry>>,
    clock: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    pruned: AtomicU64,
}

impl VirtualizationCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: AtomicUsize::new(capacity.max(1)),
            entries: Mutex::new(HashMap::new()),
            clock: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            pruned: AtomicU64::new(0),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    pub fn capacity(&self) -> usize {
        self.capacity.load(Ordering::Relaxed)
    }

    /// Change the capacity and drop every entry
    pub fn reset(&self, capacity: usize) {
        self.capacity.store(capacity.max(1), Ordering::Relaxed);
        self.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Row cached for `index` if still alive and current
    pub fn get(&self, index: usize, generation: u64) -> Option<Arc<DataRow>> {
        let mut entries = self.entries.lock();
        let live = entries.get_mut(&index).and_then(|entry| {
            if entry.generation != generation {
                return None;
            }
            let row = entry.row.upgrade()?;
            entry.last_access = self.tick();
            Some(row)
        });

        match live {
            Some(row) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(row)
            }
            None => {
                if entries.remove(&index).is_some() {
                    self.pruned.fetch_add(1, Ordering::Relaxed);
                }
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Record a row read at `generation`, evicting the least recently
    /// used entry when full
    pub fn insert(&self, index: usize, row: &Arc<DataRow>, generation: u64) {
        let mut entries = self.entries.lock();
        if !entries.contains_key(&index) && entries.len() >= self.capacity() {
            Self::evict_lru(&mut entries, 1);
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
        entries.insert(
            index,
            CacheEntry {
                row: Arc::downgrade(row),
                generation,
                last_access: self.tick(),
            },
        );
    }

    fn evict_lru(entries: &mut HashMap<usize, CacheEntry>, count: usize) {
        if count == 0 {
            return;
        }
        let mut by_age: Vec<(u64, usize)> =
            entries.iter().map(|(k, e)| (e.last_access, *k)).collect();
        by_age.sort_unstable();
        for (_, key) in by_age.into_iter().take(count) {
            entries.remove(&key);
        }
    }

    /// Drop entries whose row is gone or that predate `current_generation`
    pub fn prune_dead(&self, current_generation: u64) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, e| e.generation == current_generation && e.row.strong_count() > 0);
        let removed = before - entries.len();
        self.pruned.fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    /// Evict least recently used entries down to `target` and release
    /// spare map capacity
    pub fn shrink(&self, target: usize) -> usize {
        let mut entries = self.entries.lock();
        let excess = entries.len().saturating_sub(target);
        Self::evict_lru(&mut entries, excess);
        entries.shrink_to_fit();
        self.evictions.fetch_add(excess as u64, Ordering::Relaxed);
        excess
    }

    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        entries.clear();
        entries.shrink_to_fit();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            capacity: self.capacity(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            pruned: self.pruned.load(Ordering::Relaxed),
        }
    }
}
