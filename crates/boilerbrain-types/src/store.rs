//! The backing-store contract.
//!
//! Both the session layer and the query layer treat the durable store as an
//! opaque, possibly failing, async record store. Records are JSON objects
//! addressed by `(table, key)`.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{StoreError, StoreResult};

/// Durable record store collaborator.
///
/// Implementations must be safe to share across tasks. Any method may fail;
/// callers decide whether a failure is retried (see
/// [`StoreError::is_transient`]) or masked.
#[async_trait]
pub trait BackingStore: Send + Sync {
    /// Point lookup. Returns `Ok(None)` when no record exists.
    async fn read(&self, table: &str, key: &str) -> StoreResult<Option<Value>>;

    /// Existence probe, used to choose between insert and update.
    async fn exists(&self, table: &str, key: &str) -> StoreResult<bool>;

    /// Insert a new record. Fails with [`StoreError::Conflict`] if the key exists.
    async fn insert(&self, table: &str, key: &str, record: Value) -> StoreResult<()>;

    /// Merge the top-level fields of `partial` into an existing record.
    ///
    /// Fails with [`StoreError::NotFound`] if the key does not exist.
    async fn update(&self, table: &str, key: &str, partial: Value) -> StoreResult<()>;

    /// Delete a record. Returns true if a record was removed.
    async fn delete(&self, table: &str, key: &str) -> StoreResult<bool>;

    /// Return every record in `table` matching `filter`.
    async fn select(&self, table: &str, filter: &Filter) -> StoreResult<Vec<Value>> {
        let _ = filter;
        Err(StoreError::Unsupported(format!("select on {table}")))
    }

    /// Run a named maintenance routine (for example an expiry sweep).
    ///
    /// Best effort: stores that have no such routine report `Unsupported`
    /// and callers are expected to swallow the error.
    async fn run_maintenance_hook(&self, name: &str) -> StoreResult<()> {
        Err(StoreError::Unsupported(format!("maintenance hook {name}")))
    }
}

/// Equality filter over the top-level fields of a record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<(String, Value)>,
}

impl Filter {
    /// An empty filter that matches every record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field == value`.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push((field.into(), value.into()));
        self
    }

    /// The filter clauses in insertion order.
    pub fn clauses(&self) -> &[(String, Value)] {
        &self.clauses
    }

    /// Check if the filter has no clauses.
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Check whether a record satisfies every clause.
    pub fn matches(&self, record: &Value) -> bool {
        self.clauses
            .iter()
            .all(|(field, expected)| record.get(field) == Some(expected))
    }

    /// Canonical string form, independent of clause order.
    ///
    /// Used as part of query cache keys.
    pub fn cache_key(&self) -> String {
        let mut parts: Vec<String> = self
            .clauses
            .iter()
            .map(|(field, value)| format!("{field}={value}"))
            .collect();
        parts.sort();
        parts.join("&")
    }
}
