//! Counters that make the store's silent degradations visible.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub(crate) struct SessionMetrics {
    pub cache_hits: AtomicU64,
    pub cache_misses: AtomicU64,
    pub cold_starts: AtomicU64,
    pub read_failures: AtomicU64,
    pub decode_failures: AtomicU64,
    pub lru_evictions: AtomicU64,
    pub ttl_expirations: AtomicU64,
    pub persist_successes: AtomicU64,
    pub persist_failures: AtomicU64,
    pub maintenance_failures: AtomicU64,
}

impl SessionMetrics {
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self, size: usize, capacity: usize) -> SessionStats {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        SessionStats {
            size,
            capacity,
            cache_hits: load(&self.cache_hits),
            cache_misses: load(&self.cache_misses),
            cold_starts: load(&self.cold_starts),
            read_failures: load(&self.read_failures),
            decode_failures: load(&self.decode_failures),
            lru_evictions: load(&self.lru_evictions),
            ttl_expirations: load(&self.ttl_expirations),
            persist_successes: load(&self.persist_successes),
            persist_failures: load(&self.persist_failures),
            maintenance_failures: load(&self.maintenance_failures),
        }
    }
}

/// Point-in-time session store statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    /// Current number of cached sessions.
    pub size: usize,
    /// Maximum capacity.
    pub capacity: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// Misses where the backing store had no record.
    pub cold_starts: u64,
    /// Misses where the backing-store read failed.
    pub read_failures: u64,
    /// Misses where the stored record could not be decoded.
    pub decode_failures: u64,
    pub lru_evictions: u64,
    pub ttl_expirations: u64,
    pub persist_successes: u64,
    pub persist_failures: u64,
    pub maintenance_failures: u64,
}
