//! Per-table helpers with the standard cache key layout.

use std::sync::Arc;

use boilerbrain_types::{BackingStore, Filter};
use serde_json::Value;
use tracing::debug;

use crate::error::Result;
use crate::executor::{QueryExecutor, QueryOptions};

/// Cached reads and invalidating writes for one backing-store table.
///
/// Point lookups are cached under `<table>:id:<id>` and filtered scans under
/// `<table>:all:<filter>`. Every write clears all `<table>:` keys before it
/// is issued, so reads after a write always refetch.
#[derive(Clone)]
pub struct CachedTable {
    table: String,
    backing: Arc<dyn BackingStore>,
    executor: Arc<QueryExecutor>,
}

impl CachedTable {
    pub fn new(
        table: impl Into<String>,
        backing: Arc<dyn BackingStore>,
        executor: Arc<QueryExecutor>,
    ) -> Self {
        Self {
            table: table.into(),
            backing,
            executor,
        }
    }

    pub fn name(&self) -> &str {
        &self.table
    }

    /// Cache key for a point lookup.
    pub fn id_key(&self, id: &str) -> String {
        format!("{}:id:{id}", self.table)
    }

    /// Cache key for a filtered scan.
    pub fn all_key(&self, filter: &Filter) -> String {
        format!("{}:all:{}", self.table, filter.cache_key())
    }

    /// Fetch one record by key. A missing record is `Ok(None)` and is cached.
    pub async fn find_by_id(&self, id: &str) -> Result<Option<Value>> {
        let (backing, table) = (&self.backing, self.table.as_str());
        self.executor
            .execute(&QueryOptions::cached(self.id_key(id)), move || {
                backing.read(table, id)
            })
            .await
    }

    /// Fetch every record matching `filter`.
    pub async fn find_all(&self, filter: &Filter) -> Result<Vec<Value>> {
        let (backing, table) = (&self.backing, self.table.as_str());
        self.executor
            .execute(&QueryOptions::cached(self.all_key(filter)), move || {
                backing.select(table, filter)
            })
            .await
    }

    /// Insert a record.
    pub async fn create(&self, id: &str, record: Value) -> Result<()> {
        self.invalidate();
        let (backing, table) = (&self.backing, self.table.as_str());
        self.executor
            .execute(&QueryOptions::new(), move || {
                backing.insert(table, id, record.clone())
            })
            .await
    }

    /// Merge `partial` into an existing record.
    pub async fn update(&self, id: &str, partial: Value) -> Result<()> {
        self.invalidate();
        let (backing, table) = (&self.backing, self.table.as_str());
        self.executor
            .execute(&QueryOptions::new(), move || {
                backing.update(table, id, partial.clone())
            })
            .await
    }

    /// Delete a record, returning whether one was removed.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        self.invalidate();
        let (backing, table) = (&self.backing, self.table.as_str());
        self.executor
            .execute(&QueryOptions::new(), move || backing.delete(table, id))
            .await
    }

    fn invalidate(&self) {
        let removed = self.executor.clear(Some(&format!("{}:", self.table)));
        if removed > 0 {
            debug!(table = %self.table, removed, "Invalidated cached reads");
        }
    }
}

impl std::fmt::Debug for CachedTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedTable")
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boilerbrain_store::MemoryBackingStore;
    use serde_json::json;

    fn table() -> (CachedTable, Arc<MemoryBackingStore>) {
        let backing = Arc::new(MemoryBackingStore::new());
        let table = CachedTable::new(
            "fault_codes",
            backing.clone(),
            Arc::new(QueryExecutor::default()),
        );
        (table, backing)
    }

    #[test]
    fn test_key_layout() {
        let (table, _) = table();
        assert_eq!(table.id_key("F28"), "fault_codes:id:F28");
        assert_eq!(
            table.all_key(&Filter::new().eq("maker", "Vaillant")),
            "fault_codes:all:maker=\"Vaillant\""
        );
    }

    #[tokio::test]
    async fn test_find_by_id_is_cached() {
        let (table, backing) = table();
        backing.put_raw("fault_codes", "F28", json!({"meaning": "ignition failure"}));

        let first = table.find_by_id("F28").await.unwrap();
        let second = table.find_by_id("F28").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.unwrap()["meaning"], "ignition failure");
        assert_eq!(backing.calls("read"), 1);
    }

    #[tokio::test]
    async fn test_write_invalidates_table_reads() {
        let (table, backing) = table();
        backing.put_raw("fault_codes", "F28", json!({"maker": "Vaillant"}));

        let vaillant = Filter::new().eq("maker", "Vaillant");
        assert_eq!(table.find_all(&vaillant).await.unwrap().len(), 1);
        assert!(table.find_by_id("F29").await.unwrap().is_none());

        table
            .create("F29", json!({"maker": "Vaillant"}))
            .await
            .unwrap();

        assert_eq!(table.find_all(&vaillant).await.unwrap().len(), 2);
        assert!(table.find_by_id("F29").await.unwrap().is_some());
        assert_eq!(backing.calls("select"), 2);
        assert_eq!(backing.calls("read"), 2);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let (table, backing) = table();
        table.create("L2", json!({"maker": "Ideal"})).await.unwrap();
        table
            .update("L2", json!({"meaning": "ignition lockout"}))
            .await
            .unwrap();
        assert_eq!(
            backing.get_raw("fault_codes", "L2"),
            Some(json!({"maker": "Ideal", "meaning": "ignition lockout"}))
        );

        assert!(table.delete("L2").await.unwrap());
        assert!(!table.delete("L2").await.unwrap());
    }

    #[tokio::test]
    async fn test_conflict_is_a_business_error() {
        let (table, backing) = table();
        table.create("E1", json!({})).await.unwrap();

        let err = table.create("E1", json!({})).await.unwrap_err();
        assert_eq!(err.code(), "conflict");
        assert_eq!(backing.calls("insert"), 2);
    }
}
