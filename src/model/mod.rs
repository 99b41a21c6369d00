// Core data model shared by the store, the transformers and the pipeline

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// A single retrieved document with its retrieval score and source fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredDocument {
    pub id: String,
    pub score: f32,
    #[serde(default)]
    pub source: Map<String, Value>,
}

impl ScoredDocument {
    pub fn new(id: impl Into<String>, score: f32) -> Self {
        Self {
            id: id.into(),
            score,
            source: Map::new(),
        }
    }

    /// Read a source field as a string, if present and textual.
    pub fn source_str(&self, field: &str) -> Option<&str> {
        self.source.get(field).and_then(Value::as_str)
    }
}

/// Ordered sequence of scored documents produced by the retrieval stage.
/// Transformers consume a `ResultSet` by value and return a new one;
/// the caller's copy is never mutated in place.
pub type ResultSet = Vec<ScoredDocument>;

/// Document identifiers of a result set, in order.
pub fn result_ids(results: &ResultSet) -> Vec<&str> {
    results.iter().map(|d| d.id.as_str()).collect()
}

/// Per-request context extracted from the incoming search request.
///
/// The context map is restricted to scalar values (string, number, bool);
/// anything else is dropped with a warning rather than failing the request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestParameters {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub context: Map<String, Value>,
}

impl RequestParameters {
    /// Context entries with non-scalar values removed.
    pub fn sanitized_context(&self) -> Map<String, Value> {
        let mut out = Map::new();
        for (key, value) in &self.context {
            match value {
                Value::String(_) | Value::Number(_) | Value::Bool(_) => {
                    out.insert(key.clone(), value.clone());
                }
                _ => {
                    warn!(key = %key, "dropping non-scalar context value");
                }
            }
        }
        out
    }
}
