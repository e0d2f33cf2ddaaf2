//! Image storage backends
//!
//! Uses PostgreSQL when `DATABASE_URL` is set, otherwise falls back to the
//! in-memory store (records are lost on restart).

mod postgres;

pub use postgres::PostgresImageStore;

use std::sync::Arc;

use inkwell_core::{ImageStore, MemoryImageStore, StoreError};

use crate::config::Config;

/// Build the image store selected by `config`
pub async fn image_store_from_config(config: &Config) -> Result<Arc<dyn ImageStore>, StoreError> {
    match &config.database_url {
        Some(url) => {
            tracing::info!("Using PostgreSQL image storage");
            let store = PostgresImageStore::new(url, config.database_max_connections).await?;
            Ok(Arc::new(store))
        }
        None => Ok(in_memory()),
    }
}

/// In-memory image store (development only)
pub fn in_memory() -> Arc<dyn ImageStore> {
    tracing::warn!("DATABASE_URL not set, using in-memory image storage");
    Arc::new(MemoryImageStore::new())
}
