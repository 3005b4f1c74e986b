use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    routing::{delete, get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::dto::{AnalyzeResponse, MessageResponse, PhotoItemsResponse};
use super::services::{self, UploadedImage};
use crate::{auth::AuthUser, error::ApiError, state::AppState};

pub fn read_routes() -> Router<AppState> {
    Router::new().route("/photos/:id/items", get(get_photo_items))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/photos/analyze", post(analyze_photo))
        .route("/photos/:id", delete(delete_photo))
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024)) // 20MB
}

// --- handlers ---

/// POST /photos/analyze (multipart, field `image`)
#[instrument(skip(state, mp))]
pub async fn analyze_photo(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mut mp: Multipart,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let mut image: Option<UploadedImage> = None;
    while let Ok(Some(field)) = mp.next_field().await {
        if field.name() == Some("image") {
            let content_type = field
                .content_type()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "image/jpeg".into());
            let bytes = field
                .bytes()
                .await
                .map_err(|_| ApiError::bad_request("Failed to read the uploaded image file."))?;
            image = Some(UploadedImage {
                bytes,
                content_type,
            });
            break;
        }
    }

    let image = image
        .filter(|img| !img.bytes.is_empty())
        .ok_or_else(|| ApiError::bad_request("No image provided"))?;

    let response = services::analyze_and_save(&state, user_id, image).await?;
    Ok(Json(response))
}

#[instrument(skip(state))]
pub async fn delete_photo(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    services::delete_photo(&state, user_id, id).await?;
    Ok(Json(MessageResponse {
        message: "Photo deleted successfully".to_string(),
    }))
}

#[instrument(skip(state))]
pub async fn get_photo_items(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<PhotoItemsResponse>, ApiError> {
    let response = services::photo_items(&state, user_id, id).await?;
    Ok(Json(response))
}
