//! Integration tests for the durable configuration store: schema
//! provisioning, async CRUD and the bounded synchronous adapter.

mod common;

use searchrank::configuration::SearchConfiguration;
use searchrank::error::{Error, Result};
use searchrank::store::{ConfigurationStore, DocumentIndex, SqliteIndex, UpsertOutcome,
    SEARCH_CONFIGURATIONS_INDEX};
use std::sync::Arc;
use std::time::Duration;

// ==== CRUD round trips ====

#[tokio::test]
async fn test_put_get_round_trip() {
    let store = common::test_store();
    let body = common::rescore_config_body("plan-1");
    let config = SearchConfiguration::parse(&body, store.registry()).unwrap();

    let acknowledged = store.put_async("cfgA", &config).await.unwrap();
    assert!(acknowledged);

    let fetched = store.get_async("cfgA").await.unwrap().unwrap();
    assert_eq!(fetched.to_json(), config.to_json());
}

#[tokio::test]
async fn test_get_missing_returns_none() {
    let store = common::test_store();
    let fetched = store.get_async("no-such-configuration").await.unwrap();
    assert!(fetched.is_none());
}

#[tokio::test]
async fn test_put_identical_body_still_acknowledged() {
    let store = common::test_store();
    let body = common::rescore_config_body("plan-1");
    let config = SearchConfiguration::parse(&body, store.registry()).unwrap();

    assert!(store.put_async("cfgA", &config).await.unwrap());
    // Second write is a storage no-op but still resolves acknowledged.
    assert!(store.put_async("cfgA", &config).await.unwrap());
}

#[tokio::test]
async fn test_put_overwrites_previous_body() {
    let store = common::test_store();
    let first =
        SearchConfiguration::parse(&common::rescore_config_body("plan-1"), store.registry())
            .unwrap();
    let second =
        SearchConfiguration::parse(&common::rescore_config_body("plan-2"), store.registry())
            .unwrap();

    assert!(store.put_async("cfgA", &first).await.unwrap());
    assert!(store.put_async("cfgA", &second).await.unwrap());

    let fetched = store.get_async("cfgA").await.unwrap().unwrap();
    assert_eq!(fetched.to_json(), second.to_json());
}

#[tokio::test]
async fn test_malformed_stored_document_is_configuration_error() {
    let registry = Arc::new(searchrank::builtin_registry().unwrap());
    let index = Arc::new(SqliteIndex::in_memory(SEARCH_CONFIGURATIONS_INDEX).unwrap());
    index
        .create_schema(
            searchrank::store::SEARCH_CONFIGURATIONS_MAPPING,
            searchrank::store::SEARCH_CONFIGURATIONS_SETTINGS,
        )
        .unwrap();
    index.upsert("broken", "{not json").unwrap();

    let store = ConfigurationStore::new(index, registry);
    let err = store.get_async("broken").await.unwrap_err();
    assert!(matches!(err, Error::Configuration(_)), "{:?}", err);
}

#[tokio::test]
async fn test_configurations_survive_reopen() {
    let tmp = tempfile::tempdir().unwrap();
    {
        let store = common::test_store_at(tmp.path());
        let config =
            SearchConfiguration::parse(&common::rescore_config_body("plan-1"), store.registry())
                .unwrap();
        assert!(store.put_async("cfgA", &config).await.unwrap());
    }

    let store = common::test_store_at(tmp.path());
    let fetched = store.get_async("cfgA").await.unwrap().unwrap();
    assert_eq!(
        fetched.to_json(),
        SearchConfiguration::parse(&common::rescore_config_body("plan-1"), store.registry())
            .unwrap()
            .to_json()
    );
}

// ==== Schema provisioning ====

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_schema_provisioning_idempotent_under_concurrency() {
    let store = common::test_store();
    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = store.clone();
        handles.push(tokio::spawn(async move { store.ensure_schema_exists().await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    // The index is usable afterwards.
    assert!(store.get_async("cfgA").await.unwrap().is_none());
}

#[tokio::test]
async fn test_repeated_provisioning_is_a_noop() {
    let store = common::test_store();
    store.ensure_schema_exists().await.unwrap();
    store.ensure_schema_exists().await.unwrap();
}

// ==== Synchronous adapter ====

/// Index whose operations stall, for exercising the waiting-side timeout.
struct SlowIndex {
    delay: Duration,
}

impl DocumentIndex for SlowIndex {
    fn create_schema(&self, _mapping: &str, _settings: &str) -> Result<()> {
        Ok(())
    }

    fn exists(&self) -> Result<bool> {
        std::thread::sleep(self.delay);
        Ok(true)
    }

    fn get_by_id(&self, _id: &str) -> Result<Option<String>> {
        std::thread::sleep(self.delay);
        Ok(None)
    }

    fn upsert(&self, _id: &str, _doc: &str) -> Result<UpsertOutcome> {
        Ok(UpsertOutcome::Created)
    }
}

#[test]
fn test_get_sync_returns_stored_configuration() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = common::test_store();
    let config =
        SearchConfiguration::parse(&common::rescore_config_body("plan-1"), store.registry())
            .unwrap();
    rt.block_on(store.put_async("cfgA", &config)).unwrap();

    let fetched = store
        .get_sync(rt.handle(), "cfgA", Duration::from_secs(5))
        .unwrap()
        .unwrap();
    assert_eq!(fetched.to_json(), config.to_json());
}

#[test]
fn test_get_sync_missing_is_none() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = common::test_store();
    let fetched = store
        .get_sync(rt.handle(), "absent", Duration::from_secs(5))
        .unwrap();
    assert!(fetched.is_none());
}

#[test]
fn test_get_sync_times_out_when_storage_stalls() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let registry = Arc::new(searchrank::builtin_registry().unwrap());
    let index = Arc::new(SlowIndex {
        delay: Duration::from_secs(2),
    });
    let store = ConfigurationStore::new(index, registry);

    let result = store.get_sync(rt.handle(), "cfgA", Duration::from_millis(100));
    assert!(matches!(result, Err(Error::Timeout)), "{:?}", result);
}
