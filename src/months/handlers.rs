use axum::{extract::State, routing::get, Json, Router};
use tracing::instrument;

use super::repo::UserMonth;
use crate::{auth::AuthUser, error::ApiError, state::AppState};

/// Months are created by the day-resolution path, so this surface is
/// read-only.
pub fn read_routes() -> Router<AppState> {
    Router::new().route("/months", get(list_months))
}

#[instrument(skip(state))]
pub async fn list_months(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<UserMonth>>, ApiError> {
    let months = UserMonth::list_by_user(&state.db, user_id).await?;
    Ok(Json(months))
}
