//! In-memory backing store with fault injection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use boilerbrain_types::{BackingStore, Filter, StoreError, StoreResult};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::trace;

use crate::merge::merge_top_level;

/// Map-backed [`BackingStore`].
///
/// Records live in a `table -> key -> record` map behind a mutex. The store
/// can be told to fail: [`set_failing`](Self::set_failing) makes every call
/// return [`StoreError::Unavailable`] until switched off, and
/// [`fail_next`](Self::fail_next) fails only the next `n` calls. Every call,
/// failed or not, is counted per operation.
#[derive(Debug, Default)]
pub struct MemoryBackingStore {
    tables: Mutex<HashMap<String, HashMap<String, Value>>>,
    hooks: Mutex<Vec<String>>,
    hook_runs: Mutex<Vec<String>>,
    calls: Mutex<HashMap<&'static str, u64>>,
    failing: AtomicBool,
    fail_budget: AtomicU32,
}

impl MemoryBackingStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a maintenance hook name the store will accept.
    pub fn with_hook(self, name: impl Into<String>) -> Self {
        self.hooks.lock().push(name.into());
        self
    }

    /// Make every subsequent call fail (or stop failing).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Fail the next `n` calls, then recover.
    pub fn fail_next(&self, n: u32) {
        self.fail_budget.store(n, Ordering::SeqCst);
    }

    /// Number of times `op` was called (`"read"`, `"exists"`, `"insert"`,
    /// `"update"`, `"delete"`, `"select"`, `"maintenance"`).
    pub fn calls(&self, op: &str) -> u64 {
        self.calls.lock().get(op).copied().unwrap_or(0)
    }

    /// Names of maintenance hooks that ran successfully, in order.
    pub fn hook_runs(&self) -> Vec<String> {
        self.hook_runs.lock().clone()
    }

    /// Write a record directly, bypassing fault injection and counters.
    pub fn put_raw(&self, table: &str, key: &str, record: Value) {
        self.tables
            .lock()
            .entry(table.to_string())
            .or_default()
            .insert(key.to_string(), record);
    }

    /// Read a record directly, bypassing fault injection and counters.
    pub fn get_raw(&self, table: &str, key: &str) -> Option<Value> {
        self.tables
            .lock()
            .get(table)
            .and_then(|rows| rows.get(key))
            .cloned()
    }

    /// Number of records in a table.
    pub fn table_len(&self, table: &str) -> usize {
        self.tables.lock().get(table).map_or(0, HashMap::len)
    }

    fn enter(&self, op: &'static str) -> StoreResult<()> {
        *self.calls.lock().entry(op).or_insert(0) += 1;

        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!("injected failure ({op})")));
        }
        let budget = self
            .fail_budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if budget.is_ok() {
            return Err(StoreError::Unavailable(format!("injected failure ({op})")));
        }

        trace!(op, "memory store call");
        Ok(())
    }
}

#[async_trait]
impl BackingStore for MemoryBackingStore {
    async fn read(&self, table: &str, key: &str) -> StoreResult<Option<Value>> {
        self.enter("read")?;
        Ok(self.get_raw(table, key))
    }

    async fn exists(&self, table: &str, key: &str) -> StoreResult<bool> {
        self.enter("exists")?;
        Ok(self
            .tables
            .lock()
            .get(table)
            .is_some_and(|rows| rows.contains_key(key)))
    }

    async fn insert(&self, table: &str, key: &str, record: Value) -> StoreResult<()> {
        self.enter("insert")?;
        let mut tables = self.tables.lock();
        let rows = tables.entry(table.to_string()).or_default();
        if rows.contains_key(key) {
            return Err(StoreError::conflict(table, key));
        }
        rows.insert(key.to_string(), record);
        Ok(())
    }

    async fn update(&self, table: &str, key: &str, partial: Value) -> StoreResult<()> {
        self.enter("update")?;
        let mut tables = self.tables.lock();
        let record = tables
            .get_mut(table)
            .and_then(|rows| rows.get_mut(key))
            .ok_or_else(|| StoreError::not_found(table, key))?;
        merge_top_level(record, partial)
    }

    async fn delete(&self, table: &str, key: &str) -> StoreResult<bool> {
        self.enter("delete")?;
        Ok(self
            .tables
            .lock()
            .get_mut(table)
            .and_then(|rows| rows.remove(key))
            .is_some())
    }

    async fn select(&self, table: &str, filter: &Filter) -> StoreResult<Vec<Value>> {
        self.enter("select")?;
        let tables = self.tables.lock();
        let Some(rows) = tables.get(table) else {
            return Ok(Vec::new());
        };
        let mut keys: Vec<&String> = rows.keys().collect();
        keys.sort();
        Ok(keys
            .into_iter()
            .filter_map(|k| rows.get(k))
            .filter(|record| filter.matches(record))
            .cloned()
            .collect())
    }

    async fn run_maintenance_hook(&self, name: &str) -> StoreResult<()> {
        self.enter("maintenance")?;
        if !self.hooks.lock().iter().any(|h| h == name) {
            return Err(StoreError::Unsupported(format!("maintenance hook {name}")));
        }
        self.hook_runs.lock().push(name.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_crud_roundtrip() {
        let store = MemoryBackingStore::new();

        assert!(!store.exists("t", "a").await.unwrap());
        store.insert("t", "a", json!({"n": 1})).await.unwrap();
        assert!(store.exists("t", "a").await.unwrap());

        store.update("t", "a", json!({"m": 2})).await.unwrap();
        assert_eq!(store.read("t", "a").await.unwrap(), Some(json!({"n": 1, "m": 2})));

        assert!(store.delete("t", "a").await.unwrap());
        assert!(!store.delete("t", "a").await.unwrap());
        assert_eq!(store.read("t", "a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_insert_conflict_and_update_missing() {
        let store = MemoryBackingStore::new();
        store.insert("t", "a", json!({})).await.unwrap();

        let err = store.insert("t", "a", json!({})).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));

        let err = store.update("t", "missing", json!({})).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_failing_switch() {
        let store = MemoryBackingStore::new();
        store.set_failing(true);

        let err = store.read("t", "a").await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(store.calls("read"), 1);

        store.set_failing(false);
        assert!(store.read("t", "a").await.is_ok());
        assert_eq!(store.calls("read"), 2);
    }

    #[tokio::test]
    async fn test_fail_next_budget() {
        let store = MemoryBackingStore::new();
        store.fail_next(2);

        assert!(store.exists("t", "a").await.is_err());
        assert!(store.exists("t", "a").await.is_err());
        assert!(store.exists("t", "a").await.is_ok());
    }

    #[tokio::test]
    async fn test_select_filters() {
        let store = MemoryBackingStore::new();
        store.put_raw("codes", "1", json!({"maker": "Ideal", "code": "F1"}));
        store.put_raw("codes", "2", json!({"maker": "Vaillant", "code": "F28"}));
        store.put_raw("codes", "3", json!({"maker": "Ideal", "code": "L2"}));

        let ideal = store
            .select("codes", &Filter::new().eq("maker", "Ideal"))
            .await
            .unwrap();
        assert_eq!(ideal.len(), 2);
        assert_eq!(ideal[0]["code"], "F1");

        let none = store.select("other", &Filter::new()).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_maintenance_hooks() {
        let store = MemoryBackingStore::new().with_hook("sweep");

        store.run_maintenance_hook("sweep").await.unwrap();
        assert!(store.run_maintenance_hook("vacuum").await.is_err());
        assert_eq!(store.hook_runs(), vec!["sweep".to_string()]);
        assert_eq!(store.calls("maintenance"), 2);
    }
}
