//! Cached, retrying query execution.
//!
//! [`QueryExecutor`] wraps any backing-store operation with:
//! - an optional TTL cache keyed by a caller-chosen string ([`QueryCache`])
//! - retry with exponential backoff for transient failures ([`RetryPolicy`])
//! - latency, error and slow-query accounting ([`PerformanceMetrics`])
//!
//! Business errors reported by the store are returned as-is and never
//! retried or cached. [`CachedTable`] applies the usual key conventions for
//! point lookups and table scans, invalidating a table's cached reads
//! before every write to it.

mod cache;
mod error;
mod executor;
mod metrics;
mod retry;
mod table;

pub use cache::QueryCache;
pub use error::{QueryError, Result};
pub use executor::{ExecutorConfig, QueryExecutor, QueryOptions};
pub use metrics::{MetricsSnapshot, PerformanceMetrics};
pub use retry::RetryPolicy;
pub use table::CachedTable;
