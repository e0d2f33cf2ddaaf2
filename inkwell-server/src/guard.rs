//! Response guard middleware
//!
//! Explicit pipeline stage that runs the core [`ResponseGuard`] on every
//! routed request. A request id is minted on entry and stored in the request
//! extensions; on the way out, 2xx JSON object bodies are admitted into the
//! key set and stamped, or replaced with a 409 duplicate envelope.
//!
//! Installed with `route_layer` so that [`MatchedPath`] (the route template)
//! is available for the idempotency key.

use axum::{
    body::Body,
    extract::{MatchedPath, Request, State},
    http::{header, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use inkwell_core::{GuardOutcome, RequestContext, ResponseGuard};

use crate::error::ApiError;
use crate::state::AppState;

/// Response header echoing the minted request id
pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Middleware entry point, used with `axum::middleware::from_fn_with_state`.
pub async fn response_guard_stage(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| request.uri().path().to_owned());
    let ctx = state
        .response_guard
        .begin(request.method().as_str(), path);
    request.extensions_mut().insert(ctx.clone());

    let response = next.run(request).await;
    guard_response(&state.response_guard, &ctx, response).await
}

/// Apply the guard to an outgoing response produced under `ctx`.
pub async fn guard_response(
    guard: &ResponseGuard,
    ctx: &RequestContext,
    response: Response,
) -> Response {
    let mut response = if response.status().is_success() && is_json(&response) {
        intercept_json(guard, ctx, response).await
    } else {
        response
    };

    if let Ok(value) = HeaderValue::from_str(ctx.request_id()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

fn is_json(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.to_ascii_lowercase().starts_with("application/json"))
        .unwrap_or(false)
}

async fn intercept_json(guard: &ResponseGuard, ctx: &RequestContext, response: Response) -> Response {
    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(error = %e, request_id = %ctx.request_id(), "Failed to buffer response body");
            return ApiError::internal("Failed to read response body").into_response();
        }
    };

    let payload = match serde_json::from_slice(&bytes) {
        Ok(payload) => payload,
        // Declared JSON but unparsable; not ours to fix
        Err(_) => return Response::from_parts(parts, Body::from(bytes)),
    };

    match guard.intercept(ctx, payload) {
        GuardOutcome::Accepted(stamped) => match serde_json::to_vec(&stamped) {
            Ok(encoded) => {
                parts.headers.remove(header::CONTENT_LENGTH);
                Response::from_parts(parts, Body::from(encoded))
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode stamped response");
                ApiError::internal("Failed to encode response").into_response()
            }
        },
        GuardOutcome::Passthrough(_) => Response::from_parts(parts, Body::from(bytes)),
        GuardOutcome::Duplicate(duplicate) => {
            let status = StatusCode::from_u16(duplicate.status_code()).unwrap_or(StatusCode::CONFLICT);
            (status, Json(duplicate)).into_response()
        }
    }
}
