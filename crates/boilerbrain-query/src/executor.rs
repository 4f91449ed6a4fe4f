//! The cached query executor.

use std::future::Future;
use std::time::Duration;

use boilerbrain_types::{HasQueryConfig, StoreResult, defaults};
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::cache::QueryCache;
use crate::error::Result;
use crate::metrics::PerformanceMetrics;
use crate::retry::RetryPolicy;

/// Executor-wide settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Attempts per query when the caller does not say otherwise.
    pub max_retries: u32,
    pub base_backoff: Duration,
    pub slow_query_threshold: Duration,
    /// Cache timeout for cached queries that do not give one.
    pub default_cache_timeout: Option<Duration>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_retries: defaults::MAX_RETRIES,
            base_backoff: defaults::base_backoff(),
            slow_query_threshold: defaults::slow_query_threshold(),
            default_cache_timeout: Some(defaults::cache_timeout()),
        }
    }
}

impl ExecutorConfig {
    /// Build a configuration from any query config provider.
    pub fn from_provider<C: HasQueryConfig>(config: &C) -> Self {
        Self {
            max_retries: config.max_retries(),
            base_backoff: config.base_backoff(),
            slow_query_threshold: config.slow_query_threshold(),
            default_cache_timeout: config.default_cache_timeout(),
        }
    }
}

/// Per-call options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    cache_key: Option<String>,
    cache_timeout: Option<Option<Duration>>,
    max_retries: Option<u32>,
}

impl QueryOptions {
    /// Uncached, default retries.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache the result under `key`.
    pub fn cached(key: impl Into<String>) -> Self {
        Self {
            cache_key: Some(key.into()),
            ..Self::default()
        }
    }

    /// Override the cache timeout. `None` never expires.
    pub fn with_cache_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.cache_timeout = Some(timeout);
        self
    }

    /// Override the number of attempts.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// The cache key, if caching.
    pub fn cache_key(&self) -> Option<&str> {
        self.cache_key.as_deref()
    }
}

/// Runs backing-store operations with caching, retries and metrics.
///
/// Share one executor per process behind an `Arc`; its cache and metrics are
/// only meaningful when every caller goes through the same instance.
#[derive(Debug, Default)]
pub struct QueryExecutor {
    config: ExecutorConfig,
    cache: QueryCache,
    metrics: PerformanceMetrics,
}

impl QueryExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self {
            config,
            cache: QueryCache::new(),
            metrics: PerformanceMetrics::new(),
        }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn metrics(&self) -> &PerformanceMetrics {
        &self.metrics
    }

    /// Bulk-invalidate cached results. See [`QueryCache::clear`].
    pub fn clear(&self, pattern: Option<&str>) -> usize {
        let removed = self.cache.clear(pattern);
        debug!(pattern = pattern.unwrap_or("*"), removed, "Cleared query cache");
        removed
    }

    /// Execute an operation.
    ///
    /// With a cache key, a live cached value is returned without invoking
    /// `op`. Otherwise `op` runs under the retry policy: transient errors
    /// are retried with backoff, business errors come back immediately.
    /// Only successful results are cached.
    pub async fn execute<T, F, Fut>(&self, options: &QueryOptions, op: F) -> Result<T>
    where
        T: Clone + Send + Sync + 'static,
        F: FnMut() -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        self.metrics.record_query();

        if let Some(key) = options.cache_key() {
            if let Some(value) = self.cache.get::<T>(key) {
                self.metrics.record_hit();
                trace!(cache_key = %key, "Query cache hit");
                return Ok(value);
            }
            self.metrics.record_miss();
        }

        let label = options.cache_key().unwrap_or("uncached");
        let policy = RetryPolicy::new(
            options.max_retries.unwrap_or(self.config.max_retries),
            self.config.base_backoff,
        );

        let started = Instant::now();
        let result = policy.run(label, op).await;
        let elapsed = started.elapsed();

        self.metrics.record_latency(elapsed);
        if elapsed > self.config.slow_query_threshold {
            self.metrics.record_slow();
            warn!(
                cache_key = %label,
                elapsed_ms = elapsed.as_millis() as u64,
                "Slow query"
            );
        }

        match result {
            Ok(value) => {
                if let Some(key) = options.cache_key() {
                    let ttl = options
                        .cache_timeout
                        .unwrap_or(self.config.default_cache_timeout);
                    self.cache.set(key, value.clone(), ttl);
                }
                Ok(value)
            }
            Err(e) => {
                self.metrics.record_error();
                debug!(cache_key = %label, code = e.code(), error = %e, "Query failed");
                Err(e)
            }
        }
    }
}
