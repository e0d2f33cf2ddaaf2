//! Inkwell Core - response idempotency and upload dedup guards
//!
//! Two admission-time uniqueness guards for the Inkwell blog backend:
//!
//! - [`ResponseGuard`] makes sure a request pipeline emits at most one success
//!   payload per `(method, path, request id)`, backed by a bounded
//!   [`IdempotencyKeySet`] with FIFO batch-trim eviction.
//! - [`UploadDedupGuard`] makes sure an owner never stores the same image bytes
//!   twice, backed by an [`ImageStore`] with an atomic insert-if-absent.
//!
//! Both report failures as [`ErrorValue`]s from a closed set of kinds.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use inkwell_core::{GuardOutcome, IdempotencyKeySet, ResponseGuard};
//!
//! let guard = ResponseGuard::new(Arc::new(IdempotencyKeySet::new()));
//! let ctx = guard.begin("POST", "/posts/{id}/likes");
//!
//! let first = guard.intercept(&ctx, serde_json::json!({ "likes": 1 }));
//! assert!(matches!(first, GuardOutcome::Accepted(_)));
//!
//! let again = guard.intercept(&ctx, serde_json::json!({ "likes": 2 }));
//! assert!(matches!(again, GuardOutcome::Duplicate(_)));
//! ```

pub mod error;
pub mod hasher;
pub mod keyset;
pub mod response;
pub mod store;
pub mod upload;

pub use error::{ErrorKind, ErrorValue, Result};
pub use hasher::{ContentHasher, DIGEST_HEX_LEN};
pub use keyset::{
    IdempotencyKey, IdempotencyKeySet, KeySetConfig, DEFAULT_CAPACITY, DEFAULT_EVICT_BATCH,
};
pub use response::{
    DuplicateResponse, GuardOutcome, RequestContext, ResponseGuard, DUPLICATE_RESPONSE_MESSAGE,
};
pub use store::{ImageRecord, ImageStore, InsertOutcome, MemoryImageStore, NewImage, StoreError};
pub use upload::{ImageUpload, UploadDedupGuard, DEFAULT_MEDIA_BASE_URL, DUPLICATE_IMAGE_MESSAGE};
