//! Inkwell Server Library - HTTP boundary for the dedup guards
//!
//! This library exposes the server components for use in integration tests.
//! The main binary uses these same components.

pub mod config;
pub mod error;
pub mod guard;
pub mod handlers;
pub mod multipart;
pub mod routes;
pub mod state;
pub mod storage;
pub mod validation;

pub use config::Config;
pub use error::ApiError;
pub use guard::{guard_response, response_guard_stage, REQUEST_ID_HEADER};
pub use handlers::{OwnerId, OWNER_HEADER};
pub use routes::{create_router, create_router_with_config, create_router_with_state};
pub use state::AppState;
pub use storage::{image_store_from_config, PostgresImageStore};
