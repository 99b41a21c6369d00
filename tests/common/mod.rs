#![allow(dead_code)]

use searchrank::error::{Error, Result};
use searchrank::model::{ResultSet, ScoredDocument};
use searchrank::store::{ConfigurationStore, SqliteIndex, SEARCH_CONFIGURATIONS_INDEX};
use searchrank::transformer::personalized::PersonalizeClient;
use searchrank::transformer::rescore::{RescoreClient, RescoreDocument};
use searchrank::transformer::RankedItem;
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A store over a fresh in-memory index with the built-in registry.
pub fn test_store() -> ConfigurationStore {
    let registry = Arc::new(searchrank::builtin_registry().unwrap());
    let index = Arc::new(SqliteIndex::in_memory(SEARCH_CONFIGURATIONS_INDEX).unwrap());
    ConfigurationStore::new(index, registry)
}

/// A store over a database file under `dir`, so several store values can
/// share one backing index.
pub fn test_store_at(dir: &std::path::Path) -> ConfigurationStore {
    let registry = Arc::new(searchrank::builtin_registry().unwrap());
    let index = Arc::new(
        SqliteIndex::open(dir.join("configurations.db"), SEARCH_CONFIGURATIONS_INDEX).unwrap(),
    );
    ConfigurationStore::new(index, registry)
}

/// `n` documents `doc0..doc{n-1}` scored `n..1`, with title/body fields.
pub fn make_hits(n: usize) -> ResultSet {
    (0..n)
        .map(|i| {
            let mut doc = ScoredDocument::new(format!("doc{}", i), (n - i) as f32);
            doc.source.insert("title".into(), json!(format!("Title {}", i)));
            doc.source.insert("body".into(), json!(format!("Body {}", i)));
            doc
        })
        .collect()
}

pub fn rescore_config_body(plan_id: &str) -> serde_json::Value {
    json!({
        "result_transformers": {
            "rescore_ranking": {
                "plan_id": plan_id,
                "endpoint": "http://rescore.local/v1"
            }
        }
    })
}

/// Rescore backend double: returns a fixed ranking, or a scripted
/// failure, and counts calls.
pub struct ScriptedRescoreClient {
    pub ranking: Vec<RankedItem>,
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl ScriptedRescoreClient {
    pub fn ranking(ranking: Vec<RankedItem>) -> Self {
        Self {
            ranking,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            ranking: Vec::new(),
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl RescoreClient for ScriptedRescoreClient {
    async fn rescore(
        &self,
        _endpoint: &str,
        _plan_id: &str,
        _query: &str,
        _documents: &[RescoreDocument],
    ) -> Result<Vec<RankedItem>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::Timeout);
        }
        Ok(self.ranking.clone())
    }
}

/// Personalization backend double mirroring `ScriptedRescoreClient`.
pub struct ScriptedPersonalizeClient {
    pub ranking: Vec<RankedItem>,
    pub calls: AtomicUsize,
}

impl ScriptedPersonalizeClient {
    pub fn ranking(ranking: Vec<RankedItem>) -> Self {
        Self {
            ranking,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl PersonalizeClient for ScriptedPersonalizeClient {
    async fn personalized_ranking(
        &self,
        _endpoint: &str,
        _campaign: &str,
        _user_id: &str,
        _item_ids: &[String],
        _context: &Map<String, Value>,
    ) -> Result<Vec<RankedItem>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.ranking.clone())
    }
}
