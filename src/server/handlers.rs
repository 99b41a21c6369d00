// HTTP request handlers

use crate::configuration::SearchConfiguration;
use crate::error::Error;
use crate::model::{RequestParameters, ResultSet};
use crate::pipeline::RerankRequest;
use crate::server::ServerState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Request/Response types ───────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub transformer_types: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct PutConfigurationResponse {
    pub acknowledged: bool,
}

#[derive(Debug, Deserialize)]
pub struct RerankRequestDto {
    #[serde(default)]
    pub configuration: Option<String>,
    #[serde(default)]
    pub parameters: RequestParameters,
    pub hits: ResultSet,
}

#[derive(Debug, Serialize)]
pub struct RerankResponse {
    pub hits: ResultSet,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Map a crate error to a response status and a stable error code.
fn error_response(err: &Error) -> (StatusCode, Json<ErrorResponse>) {
    let (status, code) = match err {
        Error::Configuration(_) => (StatusCode::BAD_REQUEST, "INVALID_CONFIGURATION"),
        Error::ConfigurationNotFound(_) => (StatusCode::NOT_FOUND, "CONFIGURATION_NOT_FOUND"),
        Error::TransformerUnavailable(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "TRANSFORMER_UNAVAILABLE")
        }
        Error::Transformer(_) => (StatusCode::INTERNAL_SERVER_ERROR, "TRANSFORMER_FAILED"),
        Error::Timeout => (StatusCode::GATEWAY_TIMEOUT, "TIMEOUT"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
    };
    let body = ErrorResponse {
        error: err.to_string(),
        code: code.to_string(),
    };
    (status, Json(body))
}

// ── Handlers ────────────────────────────────────────────────────────

/// Health check endpoint
pub async fn health(State(state): State<ServerState>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        transformer_types: state
            .store
            .registry()
            .type_names()
            .into_iter()
            .map(String::from)
            .collect(),
    };
    Json(response)
}

/// Store a named search configuration
pub async fn put_configuration(
    State(state): State<ServerState>,
    Path(name): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let config = match SearchConfiguration::parse(&body, state.store.registry()) {
        Ok(config) => config,
        Err(e) => return error_response(&e).into_response(),
    };
    match state.store.put_async(&name, &config).await {
        Ok(acknowledged) => {
            tracing::info!(name = %name, acknowledged, "stored search configuration");
            Json(PutConfigurationResponse { acknowledged }).into_response()
        }
        Err(e) => error_response(&e).into_response(),
    }
}

/// Fetch a named search configuration
pub async fn get_configuration(
    State(state): State<ServerState>,
    Path(name): Path<String>,
) -> Response {
    match state.store.get_async(&name).await {
        Ok(Some(config)) => Json(config.to_json()).into_response(),
        Ok(None) => error_response(&Error::ConfigurationNotFound(name)).into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

/// Re-rank a retrieved result set through the configuration's
/// transformer chain
pub async fn rerank(State(state): State<ServerState>, Json(req): Json<RerankRequestDto>) -> Response {
    let request_id = uuid::Uuid::new_v4();
    let request = RerankRequest {
        configuration: req.configuration,
        parameters: req.parameters,
    };
    tracing::debug!(
        %request_id,
        configuration = request.configuration.as_deref().unwrap_or("<none>"),
        hits = req.hits.len(),
        "rerank request"
    );
    match state.pipeline.process(&request, req.hits).await {
        Ok(hits) => {
            let response = RerankResponse {
                total: hits.len(),
                hits,
            };
            Json(response).into_response()
        }
        Err(e) => {
            tracing::warn!(%request_id, error = %e, "rerank request failed");
            error_response(&e).into_response()
        }
    }
}
