// Result transformer capability and the installed transformer variants

pub mod personalized;
pub mod rescore;

use crate::error::Result;
use crate::model::{RequestParameters, ResultSet};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;

/// What the pipeline does when a transformer's backend call fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// Fall back to the untransformed order; the search request succeeds.
    #[default]
    BestEffort,
    /// Fail the whole search request.
    Strict,
}

/// Parsed, backend-specific settings of one transformer inside a search
/// configuration. Immutable once constructed.
pub trait TransformerConfiguration: Send + Sync + fmt::Debug {
    /// Type name this configuration was registered under.
    fn type_name(&self) -> &'static str;

    /// Failure policy for this transformer.
    fn failure_mode(&self) -> FailureMode;

    /// Serialize back to the wire representation.
    fn to_json(&self) -> serde_json::Value;

    /// Downcast support for the matching transformer implementation.
    fn as_any(&self) -> &dyn Any;
}

/// Parses the configuration body of one transformer type.
///
/// One factory per installed transformer type, registered in the
/// `TransformerRegistry` at startup.
pub trait TransformerConfigurationFactory: Send + Sync {
    fn type_name(&self) -> &'static str;

    /// Parse a configuration body. Malformed settings surface as
    /// `Error::Configuration`.
    fn parse(&self, body: &serde_json::Value) -> Result<Box<dyn TransformerConfiguration>>;
}

impl fmt::Debug for dyn TransformerConfigurationFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformerConfigurationFactory")
            .field("type_name", &self.type_name())
            .finish()
    }
}

/// A pluggable re-ranking capability invoked after retrieval.
///
/// Implementations may call a remote ranking backend. The contract:
/// an empty input is returned unchanged without touching the backend,
/// the output is a permutation of the input by document id, and a
/// missing required per-request field degrades to a pass-through
/// instead of failing the request.
#[async_trait::async_trait]
pub trait ResultTransformer: Send + Sync {
    fn type_name(&self) -> &'static str;

    async fn rerank(
        &self,
        config: &dyn TransformerConfiguration,
        results: ResultSet,
        params: &RequestParameters,
    ) -> Result<ResultSet>;
}

/// An item ranked by a remote backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedItem {
    pub id: String,
    pub score: f32,
}

/// Reorder `results` so that the backend-ranked items come first, in
/// backend order and carrying the backend score. Items the backend did not
/// rank (or ranked ids unknown to the input) keep their original relative
/// order and original score at the tail, so the output is always a
/// permutation of the input.
pub fn reorder_by_ranking(results: ResultSet, ranking: &[RankedItem]) -> ResultSet {
    let mut by_id: HashMap<&str, usize> = HashMap::with_capacity(results.len());
    for (idx, doc) in results.iter().enumerate() {
        by_id.entry(doc.id.as_str()).or_insert(idx);
    }

    let mut taken = vec![false; results.len()];
    let mut order: Vec<(usize, Option<f32>)> = Vec::with_capacity(results.len());
    for item in ranking {
        if let Some(&idx) = by_id.get(item.id.as_str()) {
            if !taken[idx] {
                taken[idx] = true;
                order.push((idx, Some(item.score)));
            }
        }
    }
    for idx in 0..results.len() {
        if !taken[idx] {
            order.push((idx, None));
        }
    }

    let mut docs: Vec<Option<_>> = results.into_iter().map(Some).collect();
    order
        .into_iter()
        .map(|(idx, score)| {
            let mut doc = docs[idx].take().expect("index taken twice");
            if let Some(score) = score {
                doc.score = score;
            }
            doc
        })
        .collect()
}
