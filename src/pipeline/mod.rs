// Orchestration of the re-ranking transformer chain

use crate::configuration::TransformerEntry;
use crate::error::{Error, Result};
use crate::model::{RequestParameters, ResultSet};
use crate::store::ConfigurationStore;
use crate::transformer::{FailureMode, ResultTransformer};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// The re-ranking view of an incoming search request: which configuration
/// it references (if any) and the per-request transformer parameters.
#[derive(Debug, Clone, Default)]
pub struct RerankRequest {
    pub configuration: Option<String>,
    pub parameters: RequestParameters,
}

/// Applies a named search configuration's transformer chain to a result
/// set.
///
/// Per request: resolve the configuration, validate the chain against the
/// installed transformers, apply it, return the final result set.
/// Transformer invocations are strictly sequential, each output feeding
/// the next input; there is no shared mutable state across requests. The
/// only deadline is each backend call's own timeout.
pub struct RerankingPipeline {
    store: ConfigurationStore,
    transformers: HashMap<&'static str, Arc<dyn ResultTransformer>>,
}

impl RerankingPipeline {
    pub fn new(store: ConfigurationStore, transformers: Vec<Arc<dyn ResultTransformer>>) -> Self {
        let transformers = transformers
            .into_iter()
            .map(|t| (t.type_name(), t))
            .collect();
        Self {
            store,
            transformers,
        }
    }

    pub fn store(&self) -> &ConfigurationStore {
        &self.store
    }

    /// Process one request. Resolves with the final result set or an
    /// explicit failure; a fatal error is never silently dropped.
    pub async fn process(&self, request: &RerankRequest, results: ResultSet) -> Result<ResultSet> {
        // Inspect: requests without a configuration reference pass through.
        let name = match request.configuration.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => return Ok(results),
        };

        // Resolve: a missing configuration is a caller usage error.
        let config = self
            .store
            .get_async(name)
            .await?
            .ok_or_else(|| Error::ConfigurationNotFound(name.to_string()))?;

        // Dispatch: validate the whole chain against the installed
        // transformers before any backend call.
        let chain: Vec<(&TransformerEntry, &Arc<dyn ResultTransformer>)> = config
            .transformers()
            .iter()
            .map(|entry| {
                self.transformers
                    .get(entry.type_name.as_str())
                    .map(|t| (entry, t))
                    .ok_or_else(|| Error::TransformerUnavailable(entry.type_name.clone()))
            })
            .collect::<Result<_>>()?;

        // Apply chain, sequentially.
        let mut current = results;
        for (entry, transformer) in chain {
            let fallback = match entry.config.failure_mode() {
                FailureMode::BestEffort => Some(current.clone()),
                FailureMode::Strict => None,
            };
            match transformer
                .rerank(entry.config.as_ref(), current, &request.parameters)
                .await
            {
                Ok(next) => {
                    debug!(
                        configuration = %name,
                        transformer = %entry.type_name,
                        hits = next.len(),
                        "transformer applied"
                    );
                    current = next;
                }
                Err(e) => match fallback {
                    Some(previous) => {
                        warn!(
                            configuration = %name,
                            transformer = %entry.type_name,
                            error = %e,
                            "transformer failed; keeping untransformed order"
                        );
                        current = previous;
                    }
                    None => {
                        return Err(Error::Transformer(format!("{}: {}", entry.type_name, e)));
                    }
                },
            }
        }

        // Publish: the caller substitutes this for the response's hits.
        Ok(current)
    }
}
