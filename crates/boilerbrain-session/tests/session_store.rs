//! End-to-end behaviour of the session store over real backing stores.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use boilerbrain_session::{
    BoilerInfo, Durability, Message, ReadFailurePolicy, Sender, SessionConfig, SessionStore,
    SessionUpdate,
};
use boilerbrain_store::{MaintenanceHook, MemoryBackingStore, SqliteBackingStore};
use boilerbrain_types::{BackingStore, StoreResult};
use serde_json::Value;

fn memory_store(config: SessionConfig) -> (SessionStore, Arc<MemoryBackingStore>) {
    let backing = Arc::new(MemoryBackingStore::new().with_hook("cleanup_expired_sessions"));
    (SessionStore::new(config, backing.clone()), backing)
}

fn vaillant_update() -> SessionUpdate {
    SessionUpdate::new()
        .with_history(vec![
            Message::user("My Vaillant ecoTEC is showing F28"),
            Message::assistant("F28 is an ignition failure. Is the gas supply on?"),
        ])
        .with_boiler_info(
            BoilerInfo::default()
                .with_manufacturer("Vaillant")
                .with_model("ecoTEC plus")
                .with_fault_code("F28"),
        )
}

#[tokio::test]
async fn update_survives_a_restart() {
    let backing = Arc::new(MemoryBackingStore::new());

    let store = SessionStore::new(SessionConfig::default(), backing.clone());
    store
        .update_session("abc", vaillant_update(), Durability::Sync)
        .await;
    store.close().await;

    let restarted = SessionStore::new(SessionConfig::default(), backing.clone());
    let session = restarted.get_session("abc").await;

    assert_eq!(session.history.len(), 2);
    assert_eq!(session.history[0].sender, Sender::User);
    assert_eq!(session.history[1].text, "F28 is an ignition failure. Is the gas supply on?");
    assert_eq!(session.boiler_info.manufacturer.as_deref(), Some("Vaillant"));
    assert_eq!(session.boiler_info.fault_codes, vec!["F28"]);
    assert!(session.persisted);
    assert_eq!(restarted.stats().cold_starts, 0);
}

#[tokio::test]
async fn outage_degrades_instead_of_failing() {
    let (store, backing) = memory_store(SessionConfig::default());
    backing.set_failing(true);

    let fresh = store.get_session("abc").await;
    assert!(fresh.history.is_empty());

    let updated = store
        .update_session("abc", vaillant_update(), Durability::Sync)
        .await;
    assert_eq!(updated.history.len(), 2);
    assert!(!updated.persisted);

    let again = store.get_session("abc").await;
    assert_eq!(again.history.len(), 2);
    assert_eq!(again.boiler_info.model.as_deref(), Some("ecoTEC plus"));

    let stats = store.stats();
    assert_eq!(stats.read_failures, 1);
    assert_eq!(stats.persist_failures, 1);
    assert_eq!(stats.persist_successes, 0);

    // Once the store is back, the next write lands.
    backing.set_failing(false);
    store
        .add_summary("abc", "suspected gas valve fault", Durability::Sync)
        .await;
    let record = backing.get_raw("chat_sessions", "abc").unwrap();
    assert_eq!(record["history"].as_array().unwrap().len(), 2);
    assert_eq!(record["summaries"][0]["summary"], "suspected gas valve fault");
}

#[tokio::test]
async fn boiler_info_accumulates_across_updates() {
    let (store, backing) = memory_store(SessionConfig::default());

    store
        .update_session("abc", vaillant_update(), Durability::Sync)
        .await;
    store
        .update_session(
            "abc",
            SessionUpdate::new().with_boiler_info(
                BoilerInfo::default()
                    .with_fault_code("F29")
                    .with_fault_code("F28"),
            ),
            Durability::Sync,
        )
        .await;

    let session = store.get_session("abc").await;
    assert_eq!(session.history.len(), 2);
    assert_eq!(session.boiler_info.manufacturer.as_deref(), Some("Vaillant"));
    assert_eq!(session.boiler_info.fault_codes, vec!["F28", "F29"]);

    let record = backing.get_raw("chat_sessions", "abc").unwrap();
    assert_eq!(record["boiler_info"]["fault_codes"], serde_json::json!(["F28", "F29"]));
}

#[tokio::test]
async fn sweep_evicts_idle_sessions_only() {
    let (store, backing) = memory_store(SessionConfig::new().with_ttl(Duration::from_millis(80)));

    store
        .update_session("idle", vaillant_update(), Durability::Sync)
        .await;
    store.get_session("busy").await;
    tokio::time::sleep(Duration::from_millis(60)).await;

    // Touched just before the sweep.
    store.get_session("busy").await;
    tokio::time::sleep(Duration::from_millis(40)).await;

    assert_eq!(store.cleanup().await, 1);
    assert!(!store.contains("idle"));
    assert!(store.contains("busy"));
    assert_eq!(store.stats().ttl_expirations, 1);

    // Expiry only drops the cached copy.
    assert!(backing.get_raw("chat_sessions", "idle").is_some());
    let reloaded = store.get_session("idle").await;
    assert_eq!(reloaded.history.len(), 2);
}

#[tokio::test]
async fn lru_keeps_capacity_and_reloads_evicted() {
    let (store, _) = memory_store(SessionConfig::new().with_max_sessions(3));

    for id in ["s1", "s2", "s3", "s4", "s5"] {
        store
            .update_session(
                id,
                SessionUpdate::new().with_history(vec![Message::user(format!("hello from {id}"))]),
                Durability::Sync,
            )
            .await;
        assert!(store.len() <= 3);
    }

    assert!(!store.contains("s1"));
    assert!(!store.contains("s2"));
    assert_eq!(store.stats().lru_evictions, 2);

    let s1 = store.get_session("s1").await;
    assert_eq!(s1.history[0].text, "hello from s1");
}

/// Backing store whose writes take a while.
struct SlowWrites {
    inner: MemoryBackingStore,
    delay: Duration,
}

#[async_trait]
impl BackingStore for SlowWrites {
    async fn read(&self, table: &str, key: &str) -> StoreResult<Option<Value>> {
        self.inner.read(table, key).await
    }

    async fn exists(&self, table: &str, key: &str) -> StoreResult<bool> {
        self.inner.exists(table, key).await
    }

    async fn insert(&self, table: &str, key: &str, record: Value) -> StoreResult<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.insert(table, key, record).await
    }

    async fn update(&self, table: &str, key: &str, partial: Value) -> StoreResult<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.update(table, key, partial).await
    }

    async fn delete(&self, table: &str, key: &str) -> StoreResult<bool> {
        self.inner.delete(table, key).await
    }
}

#[tokio::test(start_paused = true)]
async fn best_effort_returns_before_the_write_lands() {
    let backing = Arc::new(SlowWrites {
        inner: MemoryBackingStore::new(),
        delay: Duration::from_secs(5),
    });
    let store = SessionStore::new(SessionConfig::default(), backing.clone());

    let session = store
        .update_session("abc", vaillant_update(), Durability::BestEffort)
        .await;
    assert_eq!(session.history.len(), 2);
    assert!(backing.inner.get_raw("chat_sessions", "abc").is_none());

    // Readers see the cached copy straight away.
    assert_eq!(store.get_session("abc").await.history.len(), 2);

    store.flush().await;
    assert!(backing.inner.get_raw("chat_sessions", "abc").is_some());
    assert!(store.peek("abc").unwrap().persisted);
}

#[tokio::test]
async fn sqlite_backing_roundtrip_and_retention() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sessions.db");

    {
        let backing = SqliteBackingStore::open(&path).unwrap();
        let store = SessionStore::new(SessionConfig::default(), Arc::new(backing));
        store
            .update_session("abc", vaillant_update(), Durability::Sync)
            .await;
        store
            .add_summary("abc", "advised checking gas meter", Durability::Sync)
            .await;
        store.close().await;
    }

    let backing = SqliteBackingStore::open(&path).unwrap().with_hook(
        "cleanup_expired_sessions",
        MaintenanceHook::ExpireRecords {
            table: "chat_sessions".to_string(),
            older_than: Duration::from_millis(20),
        },
    );
    let store = SessionStore::new(SessionConfig::default(), Arc::new(backing.clone()));

    let session = store.get_session("abc").await;
    assert_eq!(session.history.len(), 2);
    assert_eq!(session.summaries[0].summary, "advised checking gas meter");
    assert_eq!(session.boiler_info.manufacturer.as_deref(), Some("Vaillant"));

    // The post-sweep hook prunes durable records past retention.
    tokio::time::sleep(Duration::from_millis(40)).await;
    store.cleanup().await;
    assert_eq!(store.stats().maintenance_failures, 0);
    assert!(backing.read("chat_sessions", "abc").await.unwrap().is_none());
}

#[tokio::test]
async fn corrupt_sqlite_body_is_treated_as_missing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sessions.db");

    {
        let store = SessionStore::new(
            SessionConfig::default(),
            Arc::new(SqliteBackingStore::open(&path).unwrap()),
        );
        store
            .update_session("abc", vaillant_update(), Durability::Sync)
            .await;
        store.close().await;
    }

    let conn = rusqlite::Connection::open(&path).unwrap();
    conn.execute(
        "UPDATE records SET body = '{not json' WHERE tbl = 'chat_sessions' AND key = 'abc'",
        [],
    )
    .unwrap();
    drop(conn);

    let backing = Arc::new(SqliteBackingStore::open(&path).unwrap());
    let store = SessionStore::new(
        SessionConfig::new().with_read_failure_policy(ReadFailurePolicy::RetryNextAccess),
        backing,
    );

    let session = store.get_session("abc").await;
    assert!(session.history.is_empty());
    assert!(store.contains("abc"));

    let stats = store.stats();
    assert_eq!(stats.decode_failures, 1);
    assert_eq!(stats.read_failures, 0);

    // Cached fresh session: no second read of the corrupt row.
    store.get_session("abc").await;
    assert_eq!(store.stats().decode_failures, 1);
}
