//! Error taxonomy shared by the response and upload guards.
//!
//! Every failure raised by the core is an [`ErrorValue`] drawn from the closed
//! set of [`ErrorKind`]s. The boundary layer turns these into HTTP responses
//! without re-deriving status codes.

use serde::Serialize;
use thiserror::Error;

/// Closed set of error categories raised by the guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// Malformed input. Fail fast, never retried.
    BadRequest,
    /// A uniqueness constraint rejected the operation. Permanent.
    DuplicatedResource,
    Unauthorized,
    NotFound,
    /// Unexpected failure. Retried only by the caller's own policy.
    Internal,
}

impl ErrorKind {
    /// Default HTTP status code for this kind.
    pub fn status_code(self) -> u16 {
        match self {
            Self::BadRequest => 400,
            Self::Unauthorized => 401,
            Self::NotFound => 404,
            Self::DuplicatedResource => 409,
            Self::Internal => 500,
        }
    }

    /// Default human-readable message used when none is supplied.
    pub fn default_message(self) -> &'static str {
        match self {
            Self::BadRequest => "Bad request",
            Self::Unauthorized => "Unauthorized",
            Self::NotFound => "Resource not found",
            Self::DuplicatedResource => "Resource already exists",
            Self::Internal => "Internal server error",
        }
    }

    /// Lowercase label used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BadRequest => "bad_request",
            Self::Unauthorized => "unauthorized",
            Self::NotFound => "not_found",
            Self::DuplicatedResource => "duplicated_resource",
            Self::Internal => "internal",
        }
    }
}

/// Structured error carrying its kind, status code and message.
///
/// Immutable once constructed: fields are private and only readable.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{message}")]
#[serde(rename_all = "camelCase")]
pub struct ErrorValue {
    message: String,
    status_code: u16,
    kind: ErrorKind,
}

impl ErrorValue {
    /// Create an error of the given kind with a custom message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: kind.status_code(),
            kind,
        }
    }

    /// Create an error of the given kind with its default message.
    pub fn from_kind(kind: ErrorKind) -> Self {
        Self::new(kind, kind.default_message())
    }

    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, message)
    }

    /// Create a duplicated resource error
    pub fn duplicated(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DuplicatedResource, message)
    }

    /// Create an unauthorized error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

pub type Result<T> = std::result::Result<T, ErrorValue>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_status_codes() {
        assert_eq!(ErrorValue::bad_request("x").status_code(), 400);
        assert_eq!(ErrorValue::unauthorized("x").status_code(), 401);
        assert_eq!(ErrorValue::not_found("x").status_code(), 404);
        assert_eq!(ErrorValue::duplicated("x").status_code(), 409);
        assert_eq!(ErrorValue::internal("x").status_code(), 500);
    }

    #[test]
    fn test_message_override_and_default() {
        let err = ErrorValue::duplicated("duplicate image for this owner");
        assert_eq!(err.message(), "duplicate image for this owner");
        assert_eq!(err.to_string(), "duplicate image for this owner");

        let err = ErrorValue::from_kind(ErrorKind::NotFound);
        assert_eq!(err.message(), "Resource not found");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_serializes_message_and_status() {
        let json = serde_json::to_value(ErrorValue::bad_request("bad owner")).unwrap();
        assert_eq!(json["message"], "bad owner");
        assert_eq!(json["statusCode"], 400);
        assert_eq!(json["kind"], "BadRequest");
    }
}
