// Searchrank - pluggable post-retrieval result re-ranking

pub mod cli;
pub mod config;
pub mod configuration;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod registry;
pub mod server;
pub mod store;
pub mod transformer;

use crate::config::BackendClientConfig;
use crate::registry::TransformerRegistry;
use crate::transformer::personalized::{
    HttpPersonalizeClient, PersonalizedConfigurationFactory, PersonalizedRanker,
};
use crate::transformer::rescore::{HttpRescoreClient, RescoreConfigurationFactory, RescoreRanker};
use crate::transformer::ResultTransformer;
use std::sync::Arc;
use std::time::Duration;

/// Process-wide upper bound for the store's blocking adapter.
pub const OPERATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Registry of the transformer types shipped with this crate.
pub fn builtin_registry() -> error::Result<TransformerRegistry> {
    Ok(TransformerRegistry::builder()
        .register(Arc::new(RescoreConfigurationFactory))?
        .register(Arc::new(PersonalizedConfigurationFactory))?
        .build())
}

/// Instances of the transformers shipped with this crate, wired to their
/// HTTP backend clients.
pub fn builtin_transformers(
    backend: &BackendClientConfig,
) -> error::Result<Vec<Arc<dyn ResultTransformer>>> {
    let timeout = Duration::from_secs(backend.timeout_secs);
    Ok(vec![
        Arc::new(RescoreRanker::new(Arc::new(HttpRescoreClient::new(timeout)?))),
        Arc::new(PersonalizedRanker::new(Arc::new(HttpPersonalizeClient::new(
            timeout,
        )?))),
    ])
}
