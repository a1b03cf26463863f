//! SignalTrace API
//!
//! Axum service exposing the anomaly-analysis pipeline over HTTP:
//! - `POST /api/analyze` streams NDJSON verdicts for a batch of log entries
//! - `POST /api/remediate` returns a remediation plan for one flagged entry
//! - `GET /api/logs/demo` generates a synthetic dataset
//! - `GET /health` liveness probe
//!
//! With `OPENAI_API_KEY` set, classification and remediation go through the
//! chat-completions backend; without it, the service runs entirely on the
//! local rule engine and playbooks.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod loggen;
pub mod model;
pub mod producer;
pub mod routes;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use model::ModelClient;

/// Shared service state
pub struct AppState {
    /// Service configuration
    pub config: ApiConfig,
    /// Model backend client, present only when an API key is configured
    pub model: Option<ModelClient>,
}

impl AppState {
    /// Build state from configuration, constructing the model client when a
    /// key is present.
    pub fn new(config: ApiConfig) -> Self {
        let model = config.model_api_key.as_ref().map(|key| {
            ModelClient::new(key.clone(), config.model.clone(), config.model_base_url.clone())
        });
        Self { config, model }
    }
}

/// Build the service router
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/api/analyze", post(routes::analyze::analyze))
        .route("/api/remediate", post(routes::remediate::remediate))
        .route("/api/logs/demo", get(routes::logs::demo_logs))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
