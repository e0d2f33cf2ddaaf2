//! Application state module
//!
//! Defines shared state accessible across all request handlers.

use std::sync::Arc;

use inkwell_core::{IdempotencyKeySet, ImageStore, ResponseGuard, UploadDedupGuard};

use crate::config::Config;
use crate::error::ApiError;

/// Application state containing shared resources.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Response idempotency guard (owns the process-wide key set)
    pub response_guard: ResponseGuard,
    /// Per-owner image upload dedup guard
    pub uploads: Arc<UploadDedupGuard>,
    /// Maximum upload size in bytes
    pub max_file_size: usize,
}

impl AppState {
    /// Build state from configuration around an already-selected image store.
    pub fn new(config: &Config, store: Arc<dyn ImageStore>) -> Result<Self, ApiError> {
        let keys = IdempotencyKeySet::with_config(config.key_set_config())?;
        tracing::info!(
            capacity = keys.capacity(),
            evict_batch = keys.evict_batch(),
            "Response idempotency key set ready"
        );

        let uploads =
            UploadDedupGuard::new(store).with_media_base_url(config.media_base_url.clone());

        Ok(Self {
            response_guard: ResponseGuard::new(Arc::new(keys)),
            uploads: Arc::new(uploads),
            max_file_size: config.max_file_size(),
        })
    }
}
