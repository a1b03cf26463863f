//! Demo dataset endpoint

use axum::Json;
use serde_json::json;
use tracing::info;

use crate::loggen::generate_demo_logs;

/// Generate a fresh synthetic log batch
pub async fn demo_logs() -> Json<serde_json::Value> {
    let logs = generate_demo_logs();
    info!(count = logs.len(), "generated demo log batch");
    Json(json!({ "data": logs, "count": logs.len() }))
}
