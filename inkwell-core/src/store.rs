//! Image metadata persistence contract.
//!
//! The upload guard depends on one guarantee from storage: inserting a record
//! is atomic with respect to the `(content_hash, owner)` uniqueness check.
//! [`ImageStore::insert_if_absent`] makes that guarantee part of the interface
//! rather than leaving it to schema configuration.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Persisted image metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    pub id: Uuid,
    pub url: String,
    pub name: String,
    pub alt_text: String,
    pub owner: String,
    /// SHA-256 of the uploaded bytes (hex-encoded)
    pub content_hash: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a new image record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewImage {
    pub url: String,
    pub name: String,
    pub alt_text: String,
    pub owner: String,
    pub content_hash: String,
    pub tags: Vec<String>,
}

impl NewImage {
    /// Materialize a record with a fresh id and timestamps.
    pub fn into_record(self) -> ImageRecord {
        let now = Utc::now();
        ImageRecord {
            id: Uuid::new_v4(),
            url: self.url,
            name: self.name,
            alt_text: self.alt_text,
            owner: self.owner,
            content_hash: self.content_hash,
            tags: self.tags,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Outcome of an atomic insert-if-absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(ImageRecord),
    /// A record with the same `(content_hash, owner)` already exists.
    Conflict,
}

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Database migration error: {0}")]
    Migration(String),

    #[error("Query error: {0}")]
    Query(String),
}

/// Persistence collaborator for image records.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Insert `image` unless a record with the same `(content_hash, owner)`
    /// exists. The check and the write must be one atomic operation.
    async fn insert_if_absent(&self, image: NewImage) -> Result<InsertOutcome, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<ImageRecord>, StoreError>;

    /// Check backend health (always Ok for memory)
    async fn check_health(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn is_persistent(&self) -> bool {
        false
    }
}

type HashOwner = (String, String);

/// In-memory image store (development and tests).
///
/// Records are keyed by `(content_hash, owner)`; the map entry lock makes the
/// uniqueness check and insertion a single step.
#[derive(Default)]
pub struct MemoryImageStore {
    by_key: DashMap<HashOwner, ImageRecord>,
    by_id: DashMap<Uuid, HashOwner>,
}

impl MemoryImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

#[async_trait]
impl ImageStore for MemoryImageStore {
    async fn insert_if_absent(&self, image: NewImage) -> Result<InsertOutcome, StoreError> {
        let key = (image.content_hash.clone(), image.owner.clone());
        match self.by_key.entry(key.clone()) {
            Entry::Occupied(_) => Ok(InsertOutcome::Conflict),
            Entry::Vacant(slot) => {
                let record = image.into_record();
                self.by_id.insert(record.id, key);
                slot.insert(record.clone());
                Ok(InsertOutcome::Inserted(record))
            }
        }
    }

    async fn get(&self, id: Uuid) -> Result<Option<ImageRecord>, StoreError> {
        let Some(key) = self.by_id.get(&id).map(|entry| entry.value().clone()) else {
            return Ok(None);
        };
        Ok(self.by_key.get(&key).map(|entry| entry.value().clone()))
    }
}

impl std::fmt::Debug for MemoryImageStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryImageStore")
            .field("records", &self.by_key.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn new_image(hash: &str, owner: &str) -> NewImage {
        NewImage {
            url: format!("/media/{}", hash),
            name: "sunset.png".into(),
            alt_text: "A sunset".into(),
            owner: owner.into(),
            content_hash: hash.into(),
            tags: vec!["travel".into()],
        }
    }

    #[tokio::test]
    async fn test_insert_then_conflict() {
        let store = MemoryImageStore::new();
        let first = store.insert_if_absent(new_image("h1", "alice")).await.unwrap();
        let InsertOutcome::Inserted(record) = first else {
            panic!("expected insert");
        };
        assert_eq!(record.owner, "alice");
        assert_eq!(record.created_at, record.updated_at);

        let second = store.insert_if_absent(new_image("h1", "alice")).await.unwrap();
        assert_eq!(second, InsertOutcome::Conflict);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_same_hash_different_owner() {
        let store = MemoryImageStore::new();
        store.insert_if_absent(new_image("h1", "alice")).await.unwrap();
        let outcome = store.insert_if_absent(new_image("h1", "bob")).await.unwrap();
        assert!(matches!(outcome, InsertOutcome::Inserted(_)));
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_lookup_by_id() {
        let store = MemoryImageStore::new();
        let InsertOutcome::Inserted(record) =
            store.insert_if_absent(new_image("h2", "carol")).await.unwrap()
        else {
            panic!("expected insert");
        };

        assert_eq!(store.get(record.id).await.unwrap(), Some(record));
        assert!(store.get(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_inserts_single_winner() {
        let store = Arc::new(MemoryImageStore::new());
        let tasks: Vec<_> = (0..32)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store.insert_if_absent(new_image("same", "alice")).await.unwrap()
                })
            })
            .collect();

        let mut inserted = 0;
        for task in tasks {
            if let InsertOutcome::Inserted(_) = task.await.unwrap() {
                inserted += 1;
            }
        }
        assert_eq!(inserted, 1);
        assert_eq!(store.len(), 1);
    }
}
