//! Inkwell Server - image uploads and idempotent JSON responses
//!
//! Endpoints:
//! - POST /images      - Upload an image (multipart: file, name?, alt_text?, tags?)
//! - GET  /images/{id} - Fetch an image record
//! - GET  /health      - Health check
//! - GET  /ready       - Readiness probe

use std::net::SocketAddr;

use anyhow::Context;
use inkwell_server::{create_router_with_state, image_store_from_config, AppState, Config};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    tracing::info!(
        persistent = config.database_url.is_some(),
        dedup_capacity = config.dedup_capacity,
        dedup_evict_batch = config.dedup_evict_batch,
        "Starting inkwell-server"
    );

    let store = image_store_from_config(&config)
        .await
        .context("failed to initialise image storage")?;
    let state = AppState::new(&config, store).context("invalid idempotency limits")?;
    let app = create_router_with_state(&config, state).context("invalid server configuration")?;

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
