// HTTP surface for configuration CRUD and re-ranking
// Thin delegation into the configuration store and the pipeline

pub mod handlers;

use crate::config::Config;
use crate::pipeline::RerankingPipeline;
use crate::store::{ConfigurationStore, SqliteIndex, SEARCH_CONFIGURATIONS_INDEX};
use anyhow::Result;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;

/// Shared server state
#[derive(Clone)]
pub struct ServerState {
    pub store: ConfigurationStore,
    pub pipeline: Arc<RerankingPipeline>,
}

/// Initialize logging for the server
pub fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "searchrank=debug,tower=warn,axum=warn".into());

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Run the HTTP server
pub fn run_server(config: &Config) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;

    rt.block_on(async {
        let registry = Arc::new(crate::builtin_registry()?);
        let index = Arc::new(SqliteIndex::open(
            config.db_path(),
            SEARCH_CONFIGURATIONS_INDEX,
        )?);
        let store = ConfigurationStore::new(index, registry);
        let transformers = crate::builtin_transformers(&config.backend)?;
        let pipeline = Arc::new(RerankingPipeline::new(store.clone(), transformers));

        let state = ServerState { store, pipeline };
        let app = build_router(state);

        let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
            .parse()
            .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], config.server.port)));

        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Searchrank HTTP server listening on http://{}", addr);
        tracing::info!("API endpoints available:");
        tracing::info!("  GET  /health                        - Health check");
        tracing::info!("  PUT  /search_configuration/{{name}}   - Store a search configuration");
        tracing::info!("  GET  /search_configuration/{{name}}   - Fetch a search configuration");
        tracing::info!("  POST /rerank                        - Re-rank a result set");

        axum::serve(listener, app).await?;
        Ok::<(), anyhow::Error>(())
    })
}

/// Build the router with all endpoints
pub fn build_router(state: ServerState) -> Router {
    use axum::routing::{get, post, put};
    use tower_http::cors::{Any, CorsLayer};
    use tower_http::trace::TraceLayer;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/search_configuration/{name}",
            put(handlers::put_configuration).get(handlers::get_configuration),
        )
        .route("/rerank", post(handlers::rerank))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
