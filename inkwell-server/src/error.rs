//! API error handling module
//!
//! The only place where an [`ErrorValue`] from the core becomes an HTTP
//! response. Status code and message are carried over verbatim.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use inkwell_core::{ErrorKind, ErrorValue};
use thiserror::Error;

/// API error type wrapping the core error taxonomy
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub ErrorValue);

impl ApiError {
    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self(ErrorValue::bad_request(message))
    }

    /// Create an unauthorized error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self(ErrorValue::unauthorized(message))
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self(ErrorValue::not_found(message))
    }

    /// Create an internal server error
    pub fn internal(message: impl Into<String>) -> Self {
        Self(ErrorValue::internal(message))
    }

    pub fn kind(&self) -> ErrorKind {
        self.0.kind()
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let category = self.kind().as_str();
        let message = self.0.message();

        match self.kind() {
            ErrorKind::BadRequest | ErrorKind::NotFound => {
                tracing::warn!(status = %status, category, error = %message, "Client error");
            }
            ErrorKind::Unauthorized => {
                tracing::warn!(status = %status, category, error = %message, "Authentication error");
            }
            ErrorKind::DuplicatedResource => {
                tracing::info!(status = %status, category, error = %message, "Conflict");
            }
            ErrorKind::Internal => {
                tracing::error!(status = %status, category, error = %message, "Server error");
            }
        }

        (status, Json(&self.0)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_duplicate_maps_to_conflict_body() {
        let response = ApiError::from(ErrorValue::duplicated("duplicate image for this owner"))
            .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["message"], "duplicate image for this owner");
        assert_eq!(json["statusCode"], 409);
        assert_eq!(json["kind"], "DuplicatedResource");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::bad_request("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::unauthorized("x").status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::not_found("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::internal("x").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
