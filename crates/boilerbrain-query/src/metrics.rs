//! Query performance counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;

#[derive(Debug, Default, Clone, Copy)]
struct LatencyStats {
    count: u64,
    total: Duration,
    min: Option<Duration>,
    max: Option<Duration>,
}

/// Running totals for a [`QueryExecutor`](crate::QueryExecutor).
///
/// Latency is kept as running min/max/sum rather than a list of samples, so
/// memory stays constant however long the process runs.
#[derive(Debug, Default)]
pub struct PerformanceMetrics {
    total_queries: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    errors: AtomicU64,
    slow_queries: AtomicU64,
    latency: Mutex<LatencyStats>,
}

impl PerformanceMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_query(&self) {
        self.total_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_slow(&self) {
        self.slow_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_latency(&self, elapsed: Duration) {
        let mut stats = self.latency.lock();
        stats.count += 1;
        stats.total = stats.total.saturating_add(elapsed);
        stats.min = Some(stats.min.map_or(elapsed, |min| min.min(elapsed)));
        stats.max = Some(stats.max.map_or(elapsed, |max| max.max(elapsed)));
    }

    /// Take a point-in-time snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let latency = *self.latency.lock();
        let hits = self.cache_hits.load(Ordering::Relaxed);
        let misses = self.cache_misses.load(Ordering::Relaxed);
        let lookups = hits + misses;

        MetricsSnapshot {
            total_queries: self.total_queries.load(Ordering::Relaxed),
            cache_hits: hits,
            cache_misses: misses,
            errors: self.errors.load(Ordering::Relaxed),
            slow_queries: self.slow_queries.load(Ordering::Relaxed),
            timed_queries: latency.count,
            min_latency_ms: latency.min.map(as_ms),
            max_latency_ms: latency.max.map(as_ms),
            avg_latency_ms: (latency.count > 0)
                .then(|| as_ms(latency.total) / latency.count as f64),
            hit_rate: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
        }
    }

    /// Zero every counter.
    pub fn reset(&self) {
        for counter in [
            &self.total_queries,
            &self.cache_hits,
            &self.cache_misses,
            &self.errors,
            &self.slow_queries,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        *self.latency.lock() = LatencyStats::default();
    }
}

fn as_ms(d: Duration) -> f64 {
    d.as_nanos() as f64 / 1_000_000.0
}

/// Point-in-time query statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub total_queries: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub errors: u64,
    pub slow_queries: u64,
    /// Invocations that ran the operation and were timed.
    pub timed_queries: u64,
    pub min_latency_ms: Option<f64>,
    pub max_latency_ms: Option<f64>,
    pub avg_latency_ms: Option<f64>,
    /// Hits over cache lookups, 0.0 before any lookup.
    pub hit_rate: f64,
}
