//! Response idempotency guard.
//!
//! Each inbound request is given a fresh request id via [`ResponseGuard::begin`].
//! Before a success payload leaves the process, [`ResponseGuard::intercept`]
//! admits its `(method, path, request id)` key into the shared key set. The
//! first emission is stamped with bookkeeping fields; any later emission for
//! the same key is replaced by a 409 duplicate envelope.
//!
//! Only JSON objects take part. Arrays and scalars pass through untouched and
//! are never recorded.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::error::ErrorKind;
use crate::keyset::{IdempotencyKey, IdempotencyKeySet};

/// Message carried by the duplicate envelope.
pub const DUPLICATE_RESPONSE_MESSAGE: &str = "Duplicate response detected";

/// Per-request bookkeeping minted when a request enters the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    request_id: String,
    method: String,
    path: String,
}

impl RequestContext {
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn idempotency_key(&self) -> IdempotencyKey {
        IdempotencyKey::new(&self.method, &self.path, &self.request_id)
    }
}

/// Body emitted in place of a duplicate success payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateResponse {
    pub error: &'static str,
    pub original_request_id: String,
}

impl DuplicateResponse {
    pub fn status_code(&self) -> u16 {
        ErrorKind::DuplicatedResource.status_code()
    }
}

/// Result of passing a payload through the guard.
#[derive(Debug, Clone, PartialEq)]
pub enum GuardOutcome {
    /// First emission; payload carries `requestId`, `serverTimestamp`, `responseId`.
    Accepted(Value),
    /// Key already admitted; the original payload was discarded.
    Duplicate(DuplicateResponse),
    /// Not a JSON object; returned unmodified and not recorded.
    Passthrough(Value),
}

/// Admission control for outgoing success payloads.
#[derive(Debug, Clone)]
pub struct ResponseGuard {
    keys: Arc<IdempotencyKeySet>,
}

impl ResponseGuard {
    pub fn new(keys: Arc<IdempotencyKeySet>) -> Self {
        Self { keys }
    }

    /// The shared key set backing this guard.
    pub fn key_set(&self) -> &Arc<IdempotencyKeySet> {
        &self.keys
    }

    /// Mint a request id for an inbound `(method, path)`.
    pub fn begin(&self, method: impl Into<String>, path: impl Into<String>) -> RequestContext {
        RequestContext {
            request_id: Uuid::new_v4().to_string(),
            method: method.into(),
            path: path.into(),
        }
    }

    /// Admit `payload` for emission under `ctx`.
    pub fn intercept(&self, ctx: &RequestContext, payload: Value) -> GuardOutcome {
        let mut body = match payload {
            Value::Object(body) => body,
            other => return GuardOutcome::Passthrough(other),
        };

        let key = ctx.idempotency_key();
        let response_id = key.to_string();

        if !self.keys.admit(key) {
            tracing::warn!(
                request_id = %ctx.request_id,
                method = %ctx.method,
                path = %ctx.path,
                "Duplicate response suppressed"
            );
            return GuardOutcome::Duplicate(DuplicateResponse {
                error: DUPLICATE_RESPONSE_MESSAGE,
                original_request_id: ctx.request_id.clone(),
            });
        }

        body.insert("requestId".into(), Value::String(ctx.request_id.clone()));
        body.insert(
            "serverTimestamp".into(),
            Value::from(Utc::now().timestamp_millis()),
        );
        body.insert("responseId".into(), Value::String(response_id));
        GuardOutcome::Accepted(Value::Object(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn guard() -> ResponseGuard {
        ResponseGuard::new(Arc::new(IdempotencyKeySet::new()))
    }

    #[test]
    fn test_begin_mints_unique_ids() {
        let guard = guard();
        let a = guard.begin("GET", "/posts");
        let b = guard.begin("GET", "/posts");
        assert_ne!(a.request_id(), b.request_id());
        assert!(Uuid::parse_str(a.request_id()).is_ok());
    }

    #[test]
    fn test_accepted_payload_is_stamped() {
        let guard = guard();
        let ctx = guard.begin("POST", "/posts/{id}/likes");
        let before = Utc::now().timestamp_millis();

        let GuardOutcome::Accepted(body) = guard.intercept(&ctx, json!({"likes": 3})) else {
            panic!("expected accepted payload");
        };

        assert_eq!(body["likes"], 3);
        assert_eq!(body["requestId"], ctx.request_id());
        assert_eq!(
            body["responseId"],
            format!("POST:/posts/{{id}}/likes:{}", ctx.request_id())
        );
        let ts = body["serverTimestamp"].as_i64().unwrap();
        assert!(ts >= before);
    }

    #[test]
    fn test_second_emission_is_duplicate() {
        let guard = guard();
        let ctx = guard.begin("POST", "/likes");

        assert!(matches!(
            guard.intercept(&ctx, json!({"ok": true})),
            GuardOutcome::Accepted(_)
        ));
        for _ in 0..3 {
            match guard.intercept(&ctx, json!({"ok": true})) {
                GuardOutcome::Duplicate(dup) => {
                    assert_eq!(dup.error, "Duplicate response detected");
                    assert_eq!(dup.original_request_id, ctx.request_id());
                    assert_eq!(dup.status_code(), 409);
                }
                other => panic!("expected duplicate, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_duplicate_envelope_shape() {
        let dup = DuplicateResponse {
            error: DUPLICATE_RESPONSE_MESSAGE,
            original_request_id: "r1".into(),
        };
        assert_eq!(
            serde_json::to_value(dup).unwrap(),
            json!({"error": "Duplicate response detected", "originalRequestId": "r1"})
        );
    }

    #[test]
    fn test_non_object_payloads_pass_through() {
        let guard = guard();
        let ctx = guard.begin("GET", "/tags");

        for payload in [json!([1, 2, 3]), json!("text"), json!(42), Value::Null] {
            assert_eq!(
                guard.intercept(&ctx, payload.clone()),
                GuardOutcome::Passthrough(payload)
            );
        }
        assert!(guard.key_set().is_empty());
    }

    #[test]
    fn test_distinct_requests_same_route_both_accepted() {
        let guard = guard();
        let first = guard.begin("GET", "/posts");
        let second = guard.begin("GET", "/posts");
        assert!(matches!(
            guard.intercept(&first, json!({})),
            GuardOutcome::Accepted(_)
        ));
        assert!(matches!(
            guard.intercept(&second, json!({})),
            GuardOutcome::Accepted(_)
        ));
        assert_eq!(guard.key_set().len(), 2);
    }

    #[test]
    fn test_concurrent_emissions_single_acceptance() {
        let guard = guard();
        let ctx = guard.begin("POST", "/likes");
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let guard = guard.clone();
                let ctx = ctx.clone();
                std::thread::spawn(move || {
                    matches!(
                        guard.intercept(&ctx, json!({"liked": true})),
                        GuardOutcome::Accepted(_)
                    )
                })
            })
            .collect();
        let accepted = handles
            .into_iter()
            .filter_map(|h| h.join().ok())
            .filter(|ok| *ok)
            .count();
        assert_eq!(accepted, 1);
    }
}
