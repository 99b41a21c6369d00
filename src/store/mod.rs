// Durable configuration store backed by a schema-provisioned document index

mod sqlite;

pub use sqlite::SqliteIndex;

use crate::configuration::SearchConfiguration;
use crate::error::{Error, Result};
use crate::registry::TransformerRegistry;
use std::future::Future;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task;
use tracing::{info, warn};

/// Name of the backing index holding search configurations.
pub const SEARCH_CONFIGURATIONS_INDEX: &str = "search_configurations";

/// Mapping definition provisioned on first use.
pub const SEARCH_CONFIGURATIONS_MAPPING: &str = r#"{
  "properties": {
    "result_transformers": {
      "type": "object",
      "enabled": false
    }
  }
}"#;

/// Settings definition provisioned on first use.
pub const SEARCH_CONFIGURATIONS_SETTINGS: &str = r#"{
  "number_of_shards": 1,
  "auto_expand_replicas": "0-2"
}"#;

/// Outcome reported by the index for an upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
    Noop,
    Other,
}

/// Document-oriented operations the store needs from durable storage.
///
/// Operations are blocking; the store routes them through
/// `spawn_blocking` so the async paths never block a runtime worker.
pub trait DocumentIndex: Send + Sync + 'static {
    /// Provision the index schema. Fails with `Error::SchemaExists` when a
    /// concurrent caller won the race.
    fn create_schema(&self, mapping: &str, settings: &str) -> Result<()>;

    /// Whether the schema has been provisioned.
    fn exists(&self) -> Result<bool>;

    /// Fetch a raw document by id; absent documents are `None`.
    fn get_by_id(&self, id: &str) -> Result<Option<String>>;

    /// Insert or replace a document.
    fn upsert(&self, id: &str, doc: &str) -> Result<UpsertOutcome>;
}

/// Durable CRUD for named search configurations.
///
/// Every operation chains `ensure_schema_exists` in front of the document
/// access; a schema failure short-circuits the whole operation.
#[derive(Clone)]
pub struct ConfigurationStore {
    index: Arc<dyn DocumentIndex>,
    registry: Arc<TransformerRegistry>,
}

impl ConfigurationStore {
    pub fn new(index: Arc<dyn DocumentIndex>, registry: Arc<TransformerRegistry>) -> Self {
        Self { index, registry }
    }

    pub fn registry(&self) -> &TransformerRegistry {
        &self.registry
    }

    /// Idempotent lazy schema provisioning. A concurrent "already exists"
    /// outcome is treated as success; any other failure surfaces as-is.
    pub async fn ensure_schema_exists(&self) -> Result<()> {
        let index = self.index.clone();
        task::spawn_blocking(move || {
            if index.exists()? {
                return Ok(());
            }
            match index.create_schema(
                SEARCH_CONFIGURATIONS_MAPPING,
                SEARCH_CONFIGURATIONS_SETTINGS,
            ) {
                Ok(()) => {
                    info!(index = SEARCH_CONFIGURATIONS_INDEX, "created configuration index");
                    Ok(())
                }
                Err(Error::SchemaExists) => {
                    // Lost the provisioning race to a concurrent caller.
                    warn!(
                        index = SEARCH_CONFIGURATIONS_INDEX,
                        "configuration index already created"
                    );
                    Ok(())
                }
                Err(e) => Err(e),
            }
        })
        .await?
    }

    /// Resolve a named configuration. A missing document is `Ok(None)`;
    /// callers decide whether that is a not-found condition.
    pub async fn get_async(&self, name: &str) -> Result<Option<SearchConfiguration>> {
        self.ensure_schema_exists().await?;
        let index = self.index.clone();
        let id = name.to_string();
        let raw = task::spawn_blocking(move || index.get_by_id(&id)).await??;
        match raw {
            None => {
                warn!(name = %name, "search configuration not found");
                Ok(None)
            }
            Some(doc) => {
                let body: serde_json::Value = serde_json::from_str(&doc).map_err(|e| {
                    Error::Configuration(format!(
                        "stored configuration {} is malformed: {}",
                        name, e
                    ))
                })?;
                SearchConfiguration::parse(&body, &self.registry).map(Some)
            }
        }
    }

    /// Serialize and upsert a configuration. Created, updated and no-op
    /// outcomes all resolve `true`; any other storage outcome resolves
    /// `false` without failing.
    pub async fn put_async(&self, name: &str, config: &SearchConfiguration) -> Result<bool> {
        self.ensure_schema_exists().await?;
        let index = self.index.clone();
        let id = name.to_string();
        let doc = config.to_json().to_string();
        let outcome = task::spawn_blocking(move || index.upsert(&id, &doc)).await??;
        match outcome {
            UpsertOutcome::Created | UpsertOutcome::Updated | UpsertOutcome::Noop => Ok(true),
            UpsertOutcome::Other => {
                warn!(name = %name, ?outcome, "unexpected upsert outcome");
                Ok(false)
            }
        }
    }

    /// Bounded blocking adapter over `get_async` for callers that cannot
    /// consume a future. Blocks only the calling thread; must not be
    /// called from inside the runtime it is handed.
    pub fn get_sync(
        &self,
        handle: &Handle,
        name: &str,
        timeout: Duration,
    ) -> Result<Option<SearchConfiguration>> {
        let store = self.clone();
        let name = name.to_string();
        wait_for(handle, async move { store.get_async(&name).await }, timeout)?
    }
}

/// One-shot wait on an async operation with the timeout enforced on the
/// waiting side. Exactly one completion is expected; the channel holds a
/// single slot and the sender is dropped after completing.
pub fn wait_for<T: Send + 'static>(
    handle: &Handle,
    future: impl Future<Output = T> + Send + 'static,
    timeout: Duration,
) -> Result<T> {
    let (tx, rx) = mpsc::sync_channel(1);
    handle.spawn(async move {
        // The receiver may have timed out and gone away; that is not an
        // error on this side.
        let _ = tx.send(future.await);
    });
    rx.recv_timeout(timeout).map_err(|_| Error::Timeout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_for_returns_value_within_timeout() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let value = wait_for(
            rt.handle(),
            async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                42u32
            },
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_wait_for_times_out() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let result = wait_for(
            rt.handle(),
            async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                42u32
            },
            Duration::from_millis(50),
        );
        assert!(matches!(result, Err(Error::Timeout)));
    }

    #[test]
    fn test_upsert_outcome_equality() {
        assert_eq!(UpsertOutcome::Created, UpsertOutcome::Created);
        assert_ne!(UpsertOutcome::Created, UpsertOutcome::Noop);
    }
}
