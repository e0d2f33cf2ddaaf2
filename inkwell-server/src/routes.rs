//! Router configuration module
//!
//! Configures all routes, middleware layers, and creates the application router.

use std::{sync::Arc, time::Duration};

use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method, StatusCode},
    middleware,
    routing::{get, post},
    Router,
};
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::ApiError;
use crate::guard::response_guard_stage;
use crate::handlers::{get_image_handler, health, ready, upload_image_handler, OWNER_HEADER};
use crate::state::AppState;
use crate::storage;

/// Create the application router with default config and in-memory storage (for testing)
pub fn create_router() -> Router {
    create_router_with_config(&Config::default())
        .expect("default idempotency limits are valid")
}

/// Create the application router with custom configuration and in-memory storage
pub fn create_router_with_config(config: &Config) -> Result<Router, ApiError> {
    let state = AppState::new(config, storage::in_memory())?;
    create_router_with_state(config, state)
}

/// Create the application router around prepared state
pub fn create_router_with_state(config: &Config, state: AppState) -> Result<Router, ApiError> {
    config.validate()?;

    // Configure CORS based on allowed_origins
    let cors = match &config.allowed_origins {
        Some(origins) if !origins.is_empty() => {
            let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            tracing::info!("CORS: Restricting to {} origin(s)", origins.len());
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([
                    header::CONTENT_TYPE,
                    header::ACCEPT,
                    header::HeaderName::from_static(OWNER_HEADER),
                ])
        }
        _ => {
            tracing::warn!("CORS: Allowing all origins (dev mode)");
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    };

    // Request body limit (replaces axum's 2 MB extractor default)
    let body_limit = RequestBodyLimitLayer::new(config.body_limit_mb * 1024 * 1024);

    // Request timeout
    let timeout = TimeoutLayer::with_status_code(
        StatusCode::REQUEST_TIMEOUT,
        Duration::from_secs(config.timeout_secs),
    );

    // Every routed success payload passes through the response guard
    let router = Router::new()
        .route("/images", post(upload_image_handler))
        .route("/images/{id}", get(get_image_handler))
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            response_guard_stage,
        ))
        .with_state(state)
        .layer(cors)
        .layer(DefaultBodyLimit::disable())
        .layer(body_limit)
        .layer(timeout);

    // Conditionally apply rate limiting (disabled in tests, enabled in production).
    // The governor builder takes the replenish interval, not a rate.
    let router = if config.rate_limit_enabled {
        let governor_conf = GovernorConfigBuilder::default()
            .per_millisecond(config.rate_limit_period_ms())
            .burst_size(config.rate_limit_burst)
            .finish()
            .ok_or_else(|| ApiError::bad_request("Invalid rate limiter configuration"))?;

        tracing::info!(
            "Rate limiting: {} req/s (burst: {})",
            config.rate_limit_per_sec,
            config.rate_limit_burst
        );

        router.layer(GovernorLayer::new(Arc::new(governor_conf)))
    } else {
        tracing::warn!("Rate limiting: DISABLED");
        router
    };

    Ok(router.layer(TraceLayer::new_for_http()))
}
