//! PostgreSQL image store
//!
//! Uniqueness of `(content_hash, owner)` is enforced by a table constraint;
//! inserts use `ON CONFLICT ... DO NOTHING` so the check and the write are one
//! statement.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use inkwell_core::{ImageRecord, ImageStore, InsertOutcome, NewImage, StoreError};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// PostgreSQL-backed image store
#[derive(Clone)]
pub struct PostgresImageStore {
    pool: PgPool,
}

/// Row type for database queries.
#[derive(FromRow)]
struct ImageRow {
    id: Uuid,
    url: String,
    name: String,
    alt_text: String,
    owner: String,
    content_hash: String,
    tags: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ImageRow> for ImageRecord {
    fn from(row: ImageRow) -> Self {
        Self {
            id: row.id,
            url: row.url,
            name: row.name,
            alt_text: row.alt_text,
            owner: row.owner,
            content_hash: row.content_hash,
            tags: row.tags,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const SELECT_COLUMNS: &str =
    "id, url, name, alt_text, owner, content_hash, tags, created_at, updated_at";

impl PostgresImageStore {
    /// Connect to PostgreSQL and apply migrations
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        tracing::info!("Connected to PostgreSQL database");

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Migration(e.to_string()))?;

        tracing::info!("Database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl ImageStore for PostgresImageStore {
    async fn insert_if_absent(&self, image: NewImage) -> Result<InsertOutcome, StoreError> {
        let record = image.into_record();
        let query = format!(
            r#"
            INSERT INTO images
                (id, url, name, alt_text, owner, content_hash, tags, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (content_hash, owner) DO NOTHING
            RETURNING {SELECT_COLUMNS}
            "#
        );

        let row: Option<ImageRow> = sqlx::query_as(&query)
            .bind(record.id)
            .bind(&record.url)
            .bind(&record.name)
            .bind(&record.alt_text)
            .bind(&record.owner)
            .bind(&record.content_hash)
            .bind(&record.tags)
            .bind(record.created_at)
            .bind(record.updated_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        Ok(match row {
            Some(row) => InsertOutcome::Inserted(row.into()),
            None => InsertOutcome::Conflict,
        })
    }

    async fn get(&self, id: Uuid) -> Result<Option<ImageRecord>, StoreError> {
        let query = format!("SELECT {SELECT_COLUMNS} FROM images WHERE id = $1");
        let row: Option<ImageRow> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        Ok(row.map(Into::into))
    }

    async fn check_health(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(())
    }

    fn is_persistent(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_image(hash: &str, owner: &str) -> NewImage {
        NewImage {
            url: format!("/media/{}", hash),
            name: "sunset.png".into(),
            alt_text: String::new(),
            owner: owner.into(),
            content_hash: hash.into(),
            tags: vec!["travel".into()],
        }
    }

    /// Requires a live database: `DATABASE_URL=... cargo test -- --ignored`
    #[tokio::test]
    #[ignore]
    async fn test_insert_conflicts_per_owner() {
        let Ok(url) = std::env::var("DATABASE_URL") else {
            return;
        };
        let store = PostgresImageStore::new(&url, 2).await.unwrap();
        let hash = Uuid::new_v4().simple().to_string();

        let InsertOutcome::Inserted(record) =
            store.insert_if_absent(new_image(&hash, "alice")).await.unwrap()
        else {
            panic!("expected insert");
        };
        assert_eq!(record.tags, vec!["travel".to_string()]);
        assert_eq!(store.get(record.id).await.unwrap(), Some(record));

        assert_eq!(
            store.insert_if_absent(new_image(&hash, "alice")).await.unwrap(),
            InsertOutcome::Conflict
        );
        assert!(matches!(
            store.insert_if_absent(new_image(&hash, "bob")).await.unwrap(),
            InsertOutcome::Inserted(_)
        ));
    }
}
