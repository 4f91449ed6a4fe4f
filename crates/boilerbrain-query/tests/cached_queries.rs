//! Query execution against real backing stores.

use std::sync::Arc;
use std::time::Duration;

use boilerbrain_query::{CachedTable, ExecutorConfig, QueryError, QueryExecutor, QueryOptions};
use boilerbrain_store::{MemoryBackingStore, SqliteBackingStore};
use boilerbrain_types::{BackingStore, Filter};
use serde_json::json;

#[tokio::test(start_paused = true)]
async fn flaky_store_recovers_within_retry_budget() {
    let backing = Arc::new(MemoryBackingStore::new());
    backing.put_raw("manuals", "ecotec", json!({"title": "ecoTEC plus installation"}));
    let executor = Arc::new(QueryExecutor::default());
    let manuals = CachedTable::new("manuals", backing.clone(), executor.clone());

    backing.fail_next(2);
    let manual = manuals.find_by_id("ecotec").await.unwrap();
    assert_eq!(manual.unwrap()["title"], "ecoTEC plus installation");
    assert_eq!(backing.calls("read"), 3);

    let snapshot = executor.metrics().snapshot();
    assert_eq!(snapshot.errors, 0);
    assert_eq!(snapshot.cache_misses, 1);
}

#[tokio::test(start_paused = true)]
async fn outage_surfaces_after_retries_and_is_not_cached() {
    let backing = Arc::new(MemoryBackingStore::new());
    let executor = Arc::new(QueryExecutor::default());
    let manuals = CachedTable::new("manuals", backing.clone(), executor.clone());

    backing.set_failing(true);
    let err = manuals.find_by_id("ecotec").await.unwrap_err();
    assert!(matches!(err, QueryError::RetriesExhausted { attempts: 3, .. }));
    assert_eq!(backing.calls("read"), 3);
    assert!(executor.cache().is_empty());

    backing.set_failing(false);
    assert!(manuals.find_by_id("ecotec").await.unwrap().is_none());
    assert_eq!(backing.calls("read"), 4);
}

#[tokio::test]
async fn tables_share_one_cache_but_invalidate_independently() {
    let backing = Arc::new(MemoryBackingStore::new());
    let executor = Arc::new(QueryExecutor::new(ExecutorConfig {
        default_cache_timeout: None,
        ..ExecutorConfig::default()
    }));
    let codes = CachedTable::new("fault_codes", backing.clone(), executor.clone());
    let parts = CachedTable::new("parts", backing.clone(), executor.clone());

    codes.find_by_id("F28").await.unwrap();
    parts.find_by_id("fan").await.unwrap();
    assert_eq!(executor.cache().len(), 2);

    parts.create("fan", json!({"sku": "0020020021"})).await.unwrap();
    assert!(executor.cache().contains(&codes.id_key("F28")));
    assert!(!executor.cache().contains(&parts.id_key("fan")));
}

#[tokio::test]
async fn sqlite_table_scan_is_cached_until_write() {
    let backing: Arc<dyn BackingStore> = Arc::new(SqliteBackingStore::open_in_memory().unwrap());
    let executor = Arc::new(QueryExecutor::default());
    let codes = CachedTable::new("fault_codes", backing.clone(), executor.clone());

    codes
        .create("F28", json!({"maker": "Vaillant", "meaning": "ignition failure"}))
        .await
        .unwrap();
    codes
        .create("L2", json!({"maker": "Ideal", "meaning": "ignition lockout"}))
        .await
        .unwrap();

    let vaillant = Filter::new().eq("maker", "Vaillant");
    assert_eq!(codes.find_all(&vaillant).await.unwrap().len(), 1);
    assert_eq!(codes.find_all(&vaillant).await.unwrap().len(), 1);
    assert_eq!(executor.metrics().snapshot().cache_hits, 1);

    codes
        .create("F29", json!({"maker": "Vaillant", "meaning": "flame loss"}))
        .await
        .unwrap();
    assert_eq!(codes.find_all(&vaillant).await.unwrap().len(), 2);
}

#[tokio::test]
async fn raw_execute_with_custom_key() {
    let backing = Arc::new(MemoryBackingStore::new());
    backing.put_raw("engineers", "gs-123", json!({"name": "Sam"}));
    let executor = QueryExecutor::default();

    let options = QueryOptions::cached("engineers:gas_safe:gs-123")
        .with_cache_timeout(Some(Duration::from_secs(30)));
    for _ in 0..3 {
        let record = executor
            .execute(&options, || backing.read("engineers", "gs-123"))
            .await
            .unwrap();
        assert_eq!(record.unwrap()["name"], "Sam");
    }
    assert_eq!(backing.calls("read"), 1);
    assert_eq!(executor.metrics().snapshot().cache_hits, 2);
}
