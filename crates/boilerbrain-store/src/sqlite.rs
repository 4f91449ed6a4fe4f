//! JSON document store backed by SQLite.
//!
//! All tables share one `records` table keyed by `(tbl, key)`. Bodies are
//! stored as JSON text. rusqlite is synchronous, so every call runs on the
//! blocking pool while holding the connection mutex.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use boilerbrain_types::{BackingStore, Filter, StoreError, StoreResult};
use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, ErrorCode, OpenFlags, OptionalExtension, params};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::merge::merge_top_level;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS records (
    tbl TEXT NOT NULL,
    key TEXT NOT NULL,
    body TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (tbl, key)
);
CREATE INDEX IF NOT EXISTS idx_records_updated ON records (tbl, updated_at);
"#;

/// A named maintenance routine the store can run on request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaintenanceHook {
    /// Delete rows of `table` not updated within `older_than`.
    ExpireRecords { table: String, older_than: Duration },
}

/// SQLite-backed [`BackingStore`].
#[derive(Clone)]
pub struct SqliteBackingStore {
    conn: Arc<Mutex<Connection>>,
    hooks: Arc<HashMap<String, MaintenanceHook>>,
}

impl std::fmt::Debug for SqliteBackingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackingStore")
            .field("hooks", &self.hooks.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl SqliteBackingStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Unavailable(format!("cannot create {}: {e}", parent.display()))
                })?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_FULL_MUTEX,
        )
        .map_err(map_sqlite_error)?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(map_sqlite_error)?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .map_err(map_sqlite_error)?;

        let store = Self::from_connection(conn)?;
        info!("SQLite store opened at {:?}", path);
        Ok(store)
    }

    /// Create an in-memory store (useful for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(map_sqlite_error)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA).map_err(map_sqlite_error)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            hooks: Arc::new(HashMap::new()),
        })
    }

    /// Register a maintenance hook under `name`.
    pub fn with_hook(mut self, name: impl Into<String>, hook: MaintenanceHook) -> Self {
        Arc::make_mut(&mut self.hooks).insert(name.into(), hook);
        self
    }

    async fn with_conn<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> StoreResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock();
            f(&guard)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("blocking task failed: {e}")))?
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn read_body(conn: &Connection, table: &str, key: &str) -> StoreResult<Option<Value>> {
    let body: Option<String> = conn
        .query_row(
            "SELECT body FROM records WHERE tbl = ?1 AND key = ?2",
            params![table, key],
            |row| row.get(0),
        )
        .optional()
        .map_err(map_sqlite_error)?;

    body.map(|text| serde_json::from_str(&text).map_err(StoreError::from))
        .transpose()
}

/// Translate a rusqlite error into the store taxonomy.
///
/// Lock contention and I/O trouble are transient; everything else is the
/// database refusing the request.
fn map_sqlite_error(err: rusqlite::Error) -> StoreError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _) => match e.code {
            ErrorCode::DatabaseBusy
            | ErrorCode::DatabaseLocked
            | ErrorCode::CannotOpen
            | ErrorCode::SystemIoFailure => StoreError::Unavailable(err.to_string()),
            ErrorCode::ConstraintViolation => StoreError::rejected("constraint", err.to_string()),
            _ => StoreError::rejected("sqlite", err.to_string()),
        },
        _ => StoreError::rejected("sqlite", err.to_string()),
    }
}

#[async_trait]
impl BackingStore for SqliteBackingStore {
    async fn read(&self, table: &str, key: &str) -> StoreResult<Option<Value>> {
        let (table, key) = (table.to_string(), key.to_string());
        self.with_conn(move |conn| read_body(conn, &table, &key))
            .await
    }

    async fn exists(&self, table: &str, key: &str) -> StoreResult<bool> {
        let (table, key) = (table.to_string(), key.to_string());
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM records WHERE tbl = ?1 AND key = ?2)",
                params![table, key],
                |row| row.get(0),
            )
            .map_err(map_sqlite_error)
        })
        .await
    }

    async fn insert(&self, table: &str, key: &str, record: Value) -> StoreResult<()> {
        let (table, key) = (table.to_string(), key.to_string());
        let body = serde_json::to_string(&record)?;
        self.with_conn(move |conn| {
            let now = now_rfc3339();
            let inserted = conn
                .execute(
                    r#"
                    INSERT OR IGNORE INTO records (tbl, key, body, created_at, updated_at)
                    VALUES (?1, ?2, ?3, ?4, ?4)
                    "#,
                    params![table, key, body, now],
                )
                .map_err(map_sqlite_error)?;

            if inserted == 0 {
                return Err(StoreError::conflict(table, key));
            }
            debug!(table = %table, key = %key, "Inserted record");
            Ok(())
        })
        .await
    }

    async fn update(&self, table: &str, key: &str, partial: Value) -> StoreResult<()> {
        let (table, key) = (table.to_string(), key.to_string());
        self.with_conn(move |conn| {
            let mut record =
                read_body(conn, &table, &key)?.ok_or_else(|| StoreError::not_found(&table, &key))?;
            merge_top_level(&mut record, partial)?;

            let body = serde_json::to_string(&record)?;
            conn.execute(
                "UPDATE records SET body = ?3, updated_at = ?4 WHERE tbl = ?1 AND key = ?2",
                params![table, key, body, now_rfc3339()],
            )
            .map_err(map_sqlite_error)?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, table: &str, key: &str) -> StoreResult<bool> {
        let (table, key) = (table.to_string(), key.to_string());
        self.with_conn(move |conn| {
            let rows_affected = conn
                .execute(
                    "DELETE FROM records WHERE tbl = ?1 AND key = ?2",
                    params![table, key],
                )
                .map_err(map_sqlite_error)?;
            Ok(rows_affected > 0)
        })
        .await
    }

    async fn select(&self, table: &str, filter: &Filter) -> StoreResult<Vec<Value>> {
        let table = table.to_string();
        let filter = filter.clone();
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare("SELECT key, body FROM records WHERE tbl = ?1 ORDER BY key")
                .map_err(map_sqlite_error)?;
            let mut rows = stmt.query(params![table]).map_err(map_sqlite_error)?;

            let mut records = Vec::new();
            while let Some(row) = rows.next().map_err(map_sqlite_error)? {
                let key: String = row.get(0).map_err(map_sqlite_error)?;
                let body: String = row.get(1).map_err(map_sqlite_error)?;
                match serde_json::from_str::<Value>(&body) {
                    Ok(record) if filter.matches(&record) => records.push(record),
                    Ok(_) => {}
                    Err(e) => warn!(table = %table, key = %key, error = %e, "Skipping malformed record"),
                }
            }
            Ok(records)
        })
        .await
    }

    async fn run_maintenance_hook(&self, name: &str) -> StoreResult<()> {
        let Some(hook) = self.hooks.get(name).cloned() else {
            return Err(StoreError::Unsupported(format!("maintenance hook {name}")));
        };
        let name = name.to_string();

        self.with_conn(move |conn| match hook {
            MaintenanceHook::ExpireRecords { table, older_than } => {
                let older_than = chrono::Duration::from_std(older_than)
                    .map_err(|e| StoreError::Malformed(format!("retention out of range: {e}")))?;
                let cutoff = (Utc::now() - older_than).to_rfc3339_opts(SecondsFormat::Micros, true);
                let removed = conn
                    .execute(
                        "DELETE FROM records WHERE tbl = ?1 AND updated_at < ?2",
                        params![table, cutoff],
                    )
                    .map_err(map_sqlite_error)?;
                info!(hook = %name, table = %table, removed, "Maintenance hook ran");
                Ok(())
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_crud_roundtrip() {
        let store = SqliteBackingStore::open_in_memory().unwrap();

        assert_eq!(store.read("chat_sessions", "abc").await.unwrap(), None);
        assert!(!store.exists("chat_sessions", "abc").await.unwrap());

        store
            .insert("chat_sessions", "abc", json!({"session_id": "abc", "history": []}))
            .await
            .unwrap();
        assert!(store.exists("chat_sessions", "abc").await.unwrap());

        store
            .update("chat_sessions", "abc", json!({"history": [{"sender": "user", "text": "hi"}]}))
            .await
            .unwrap();
        let record = store.read("chat_sessions", "abc").await.unwrap().unwrap();
        assert_eq!(record["session_id"], "abc");
        assert_eq!(record["history"][0]["text"], "hi");

        assert!(store.delete("chat_sessions", "abc").await.unwrap());
        assert!(!store.delete("chat_sessions", "abc").await.unwrap());
    }

    #[tokio::test]
    async fn test_insert_conflict() {
        let store = SqliteBackingStore::open_in_memory().unwrap();
        store.insert("t", "k", json!({})).await.unwrap();

        let err = store.insert("t", "k", json!({})).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let store = SqliteBackingStore::open_in_memory().unwrap();
        let err = store.update("t", "nope", json!({"a": 1})).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_tables_are_isolated() {
        let store = SqliteBackingStore::open_in_memory().unwrap();
        store.insert("a", "k", json!({"from": "a"})).await.unwrap();
        store.insert("b", "k", json!({"from": "b"})).await.unwrap();

        assert_eq!(store.read("a", "k").await.unwrap().unwrap()["from"], "a");
        assert_eq!(store.read("b", "k").await.unwrap().unwrap()["from"], "b");
    }

    #[tokio::test]
    async fn test_select_with_filter() {
        let store = SqliteBackingStore::open_in_memory().unwrap();
        store
            .insert("boiler_fault_codes", "1", json!({"manufacturer": "Ideal", "fault_code": "F1"}))
            .await
            .unwrap();
        store
            .insert("boiler_fault_codes", "2", json!({"manufacturer": "Worcester", "fault_code": "EA"}))
            .await
            .unwrap();

        let all = store.select("boiler_fault_codes", &Filter::new()).await.unwrap();
        assert_eq!(all.len(), 2);

        let ideal = store
            .select("boiler_fault_codes", &Filter::new().eq("manufacturer", "Ideal"))
            .await
            .unwrap();
        assert_eq!(ideal, vec![json!({"manufacturer": "Ideal", "fault_code": "F1"})]);
    }

    #[tokio::test]
    async fn test_expire_records_hook() {
        let store = SqliteBackingStore::open_in_memory().unwrap().with_hook(
            "cleanup_expired_sessions",
            MaintenanceHook::ExpireRecords {
                table: "chat_sessions".to_string(),
                older_than: Duration::from_millis(20),
            },
        );

        store.insert("chat_sessions", "old", json!({})).await.unwrap();
        store.insert("other", "old", json!({})).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        store.insert("chat_sessions", "new", json!({})).await.unwrap();

        store.run_maintenance_hook("cleanup_expired_sessions").await.unwrap();

        assert!(!store.exists("chat_sessions", "old").await.unwrap());
        assert!(store.exists("chat_sessions", "new").await.unwrap());
        assert!(store.exists("other", "old").await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_hook_is_unsupported() {
        let store = SqliteBackingStore::open_in_memory().unwrap();
        let err = store.run_maintenance_hook("vacuum").await.unwrap_err();
        assert!(matches!(err, StoreError::Unsupported(_)));
    }

    #[tokio::test]
    async fn test_open_on_disk_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.db");

        {
            let store = SqliteBackingStore::open(&path).unwrap();
            store.insert("t", "k", json!({"v": 1})).await.unwrap();
        }

        let reopened = SqliteBackingStore::open(&path).unwrap();
        assert_eq!(reopened.read("t", "k").await.unwrap(), Some(json!({"v": 1})));
    }
}
