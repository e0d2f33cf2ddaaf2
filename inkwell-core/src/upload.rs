//! Per-owner upload dedup guard.
//!
//! Hashes uploaded bytes and stores image metadata through an [`ImageStore`]
//! whose insert is atomic on `(content_hash, owner)`. The same owner cannot
//! store the same bytes twice; different owners can.

use std::io::Read;
use std::sync::Arc;

use uuid::Uuid;

use crate::error::{ErrorValue, Result};
use crate::hasher::ContentHasher;
use crate::store::{ImageRecord, ImageStore, InsertOutcome, NewImage};

/// Message returned when an owner re-uploads identical content.
pub const DUPLICATE_IMAGE_MESSAGE: &str = "duplicate image for this owner";

/// Default prefix for generated image URLs.
pub const DEFAULT_MEDIA_BASE_URL: &str = "/media";

/// Caller-supplied metadata accompanying uploaded bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageUpload {
    pub owner: String,
    pub name: String,
    pub alt_text: String,
    pub tags: Vec<String>,
    /// Explicit URL; derived from the content hash when absent
    pub url: Option<String>,
}

impl ImageUpload {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Guards image uploads against per-owner duplicates.
pub struct UploadDedupGuard {
    store: Arc<dyn ImageStore>,
    media_base_url: String,
}

impl UploadDedupGuard {
    pub fn new(store: Arc<dyn ImageStore>) -> Self {
        Self {
            store,
            media_base_url: DEFAULT_MEDIA_BASE_URL.to_string(),
        }
    }

    pub fn with_media_base_url(mut self, base: impl Into<String>) -> Self {
        self.media_base_url = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn store(&self) -> &Arc<dyn ImageStore> {
        &self.store
    }

    /// Hash `content` and store it for `upload.owner`.
    ///
    /// Returns `DuplicatedResource` (409) if the owner already holds a record
    /// with the same digest. Never retries.
    pub async fn submit(&self, content: &[u8], upload: ImageUpload) -> Result<ImageRecord> {
        validate_owner(&upload.owner)?;
        let content_hash = ContentHasher::digest(content);
        self.store_hashed(content_hash, upload).await
    }

    /// Like [`submit`](Self::submit), reading the content from `reader`.
    ///
    /// A read failure is reported as `Internal` (500) and nothing is written.
    pub async fn submit_reader<R: Read>(
        &self,
        reader: R,
        upload: ImageUpload,
    ) -> Result<ImageRecord> {
        validate_owner(&upload.owner)?;
        let content_hash = ContentHasher::digest_reader(reader)?;
        self.store_hashed(content_hash, upload).await
    }

    /// Look up a stored record by id.
    pub async fn find(&self, id: Uuid) -> Result<ImageRecord> {
        self.store
            .get(id)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, %id, "Failed to load image record");
                ErrorValue::internal("A storage error occurred")
            })?
            .ok_or_else(|| ErrorValue::not_found(format!("Image {} not found", id)))
    }

    async fn store_hashed(&self, content_hash: String, upload: ImageUpload) -> Result<ImageRecord> {
        let url = upload
            .url
            .unwrap_or_else(|| format!("{}/{}", self.media_base_url, content_hash));
        let image = NewImage {
            url,
            name: upload.name,
            alt_text: upload.alt_text,
            owner: upload.owner,
            content_hash,
            tags: upload.tags,
        };
        let owner = image.owner.clone();
        let content_hash = image.content_hash.clone();

        let outcome = self.store.insert_if_absent(image).await.map_err(|e| {
            tracing::error!(error = %e, owner = %owner, "Image insert failed");
            ErrorValue::internal("A storage error occurred")
        })?;

        match outcome {
            InsertOutcome::Inserted(record) => {
                tracing::info!(
                    id = %record.id,
                    owner = %record.owner,
                    content_hash = %record.content_hash,
                    "Stored image"
                );
                Ok(record)
            }
            InsertOutcome::Conflict => {
                tracing::info!(owner = %owner, content_hash = %content_hash, "Duplicate upload rejected");
                Err(ErrorValue::duplicated(DUPLICATE_IMAGE_MESSAGE))
            }
        }
    }
}

fn validate_owner(owner: &str) -> Result<()> {
    if owner.trim().is_empty() {
        return Err(ErrorValue::bad_request("Owner identifier is required"));
    }
    Ok(())
}

impl std::fmt::Debug for UploadDedupGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadDedupGuard")
            .field("persistent", &self.store.is_persistent())
            .field("media_base_url", &self.media_base_url)
            .finish()
    }
}
