//! Image upload handlers
//!
//! POST /images stores image metadata through the upload dedup guard;
//! GET /images/{id} reads a record back.

use axum::{
    extract::{FromRequestParts, Multipart, Path, State},
    http::{request::Parts, StatusCode},
    Extension, Json,
};
use inkwell_core::{ImageRecord, ImageUpload, RequestContext};
use uuid::Uuid;

use super::AppState;
use crate::error::ApiError;
use crate::multipart::MultipartFields;
use crate::validation::parse_tags;

/// Header carrying the authenticated owner id (set by the auth layer)
pub const OWNER_HEADER: &str = "x-owner-id";

/// Owner identifier taken from the `x-owner-id` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerId(pub String);

impl<S: Send + Sync> FromRequestParts<S> for OwnerId {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(OWNER_HEADER)
            .ok_or_else(|| ApiError::unauthorized("Missing owner identity"))?
            .to_str()
            .map_err(|_| ApiError::bad_request("Invalid owner header encoding"))?
            .trim();

        if value.is_empty() {
            return Err(ApiError::unauthorized("Missing owner identity"));
        }
        Ok(OwnerId(value.to_string()))
    }
}

/// POST /images - Upload an image for the calling owner
///
/// Accepts multipart/form-data with:
/// - **file** (required): image bytes (`image/*` or `application/octet-stream`)
/// - **name** (optional): display name, defaults to the uploaded filename
/// - **alt_text** (optional)
/// - **tags** (optional): comma-separated
///
/// Returns 201 with the stored record, or 409 if this owner already stored
/// byte-identical content.
pub async fn upload_image_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    OwnerId(owner): OwnerId,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ImageRecord>), ApiError> {
    let mut fields = MultipartFields::parse(&mut multipart, state.max_file_size).await?;
    let file = fields.take_file()?;

    let name = fields
        .get_text("name")
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .or(file.file_name)
        .unwrap_or_default();

    let upload = ImageUpload {
        owner,
        name,
        alt_text: fields.get_text("alt_text").unwrap_or_default().trim().to_string(),
        tags: parse_tags(fields.get_text("tags"))?,
        url: None,
    };

    tracing::debug!(
        request_id = %ctx.request_id(),
        owner = %upload.owner,
        size = file.data.len(),
        "Processing image upload"
    );

    let record = state.uploads.submit(&file.data, upload).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /images/{id} - Fetch an image record
pub async fn get_image_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ImageRecord>, ApiError> {
    let record = state.uploads.find(id).await?;
    Ok(Json(record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(builder: axum::http::request::Builder) -> Result<OwnerId, ApiError> {
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        OwnerId::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_owner_from_header() {
        let owner = extract(Request::builder().header(OWNER_HEADER, " alice ")).await.unwrap();
        assert_eq!(owner, OwnerId("alice".into()));
    }

    #[tokio::test]
    async fn test_missing_owner_is_unauthorized() {
        let err = extract(Request::builder()).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);

        let err = extract(Request::builder().header(OWNER_HEADER, "   ")).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }
}
