//! Node cache statistics tracking.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics tracked by a tree's node cache.
///
/// All fields are atomic so that a [`SharedTree`](super::SharedTree) can hand
/// out the counters and let other threads read them without taking the
/// tree lock. Every access uses `Ordering::Relaxed`: the counters are
/// independent and only need to be individually consistent.
///
/// # Example
/// ```
/// use fstree::tree::CacheStats;
/// use std::sync::atomic::Ordering;
///
/// let stats = CacheStats::new();
/// stats.cache_hits.fetch_add(1, Ordering::Relaxed);
/// assert_eq!(stats.cache_hits.load(Ordering::Relaxed), 1);
/// ```
#[derive(Debug)]
pub struct CacheStats {
    /// Child lookups served from the cache.
    pub cache_hits: AtomicU64,

    /// Child lookups that had to read the device.
    pub cache_misses: AtomicU64,

    /// Nodes unloaded by an eviction sweep.
    pub evictions: AtomicU64,

    /// Nodes read from the device.
    pub nodes_read: AtomicU64,

    /// Nodes written back to the device.
    pub nodes_written: AtomicU64,

    /// Nodes created by splits and growups.
    pub nodes_allocated: AtomicU64,

    /// Nodes whose blocks went back to the allocator.
    pub nodes_released: AtomicU64,
}

impl CacheStats {
    /// Create a new stats tracker with all counters at zero.
    pub fn new() -> Self {
        Self {
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            nodes_read: AtomicU64::new(0),
            nodes_written: AtomicU64::new(0),
            nodes_allocated: AtomicU64::new(0),
            nodes_released: AtomicU64::new(0),
        }
    }

    #[inline]
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Cache hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        self.snapshot().hit_rate()
    }

    /// Get a snapshot of current statistics.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            nodes_read: self.nodes_read.load(Ordering::Relaxed),
            nodes_written: self.nodes_written.load(Ordering::Relaxed),
            nodes_allocated: self.nodes_allocated.load(Ordering::Relaxed),
            nodes_released: self.nodes_released.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        self.cache_hits.store(0, Ordering::Relaxed);
        self.cache_misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        self.nodes_read.store(0, Ordering::Relaxed);
        self.nodes_written.store(0, Ordering::Relaxed);
        self.nodes_allocated.store(0, Ordering::Relaxed);
        self.nodes_released.store(0, Ordering::Relaxed);
    }
}

impl Default for CacheStats {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time copy of [`CacheStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub evictions: u64,
    pub nodes_read: u64,
    pub nodes_written: u64,
    pub nodes_allocated: u64,
    pub nodes_released: u64,
}

impl StatsSnapshot {
    /// Cache hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Stats {{ hits: {}, misses: {}, evictions: {}, written: {}, allocated: {}, released: {}, hit_rate: {:.2}% }}",
            self.cache_hits,
            self.cache_misses,
            self.evictions,
            self.nodes_written,
            self.nodes_allocated,
            self.nodes_released,
            self.hit_rate() * 100.0
        )
    }
}
