//! SignalTrace API server binary.

use std::sync::Arc;

use signaltrace_api::{build_router, ApiConfig, AppState};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ApiConfig::from_env();
    let listen_addr = config.listen_addr.clone();
    let mode = if config.model_api_key.is_some() {
        "model backend"
    } else {
        "rule-engine fallback"
    };

    let state = Arc::new(AppState::new(config));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    info!(addr = %listen_addr, mode, "signaltrace api listening");
    axum::serve(listener, app).await?;
    Ok(())
}
