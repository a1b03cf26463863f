//! Batch analysis endpoint.
//!
//! Accepts a batch of log entries and streams one verdict per line as
//! NDJSON. Backend selection happens here: with a model API key configured,
//! entries are forwarded to the chat-completions backend and its token stream
//! is re-framed; without one, the local rule engine produces the stream.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::header;
use axum::response::Response;
use axum::Json;
use futures_util::StreamExt;
use signaltrace_core::LogEntry;
use tracing::info;

use crate::config::{FALLBACK_BATCH_CAP, REMOTE_BATCH_CAP};
use crate::error::{ApiError, ApiResult};
use crate::model::{classification_prompt, CLASSIFICATION_SYSTEM};
use crate::producer::{fallback_stream, reframe_tokens};
use crate::AppState;

/// Analyze a batch of logs, streaming NDJSON verdicts
pub async fn analyze(
    State(state): State<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> ApiResult<Response> {
    let logs = body
        .get("logs")
        .and_then(|v| v.as_array())
        .ok_or(ApiError::InvalidLogs)?;
    let mut entries: Vec<LogEntry> =
        serde_json::from_value(serde_json::Value::Array(logs.clone()))
            .map_err(|_| ApiError::InvalidLogs)?;

    let stream = match &state.model {
        Some(model) => {
            entries.truncate(REMOTE_BATCH_CAP);
            info!(count = entries.len(), "dispatching batch to model backend");
            let prompt = classification_prompt(&entries);
            let tokens = model.stream_tokens(CLASSIFICATION_SYSTEM, &prompt).await?;
            reframe_tokens(entries.len(), tokens).boxed()
        }
        None => {
            entries.truncate(FALLBACK_BATCH_CAP);
            info!(count = entries.len(), "classifying batch with rule engine");
            fallback_stream(entries, state.config.fallback_delay).boxed()
        }
    };

    let response = Response::builder()
        .header(header::CONTENT_TYPE, "application/x-ndjson")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(stream))
        .map_err(|err| ApiError::Model(err.to_string()))?;
    Ok(response)
}
