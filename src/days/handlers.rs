use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use time::macros::format_description;
use time::{Date, Month, OffsetDateTime};
use tracing::instrument;

use super::dto::{DayDetailsResponse, MonthlyTrackingResponse};
use super::repo::UserDay;
use super::services;
use crate::months::repo::UserMonth;
use crate::{auth::AuthUser, error::ApiError, state::AppState};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/days", get(list_days))
        .route("/days/:date", get(get_day_details))
        .route("/tracking/:year/:month", get(get_monthly_tracking))
}

pub fn write_routes() -> Router<AppState> {
    Router::new().route("/days", post(create_day))
}

#[instrument(skip(state))]
pub async fn list_days(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<UserDay>>, ApiError> {
    let days = UserDay::list_by_user(&state.db, user_id).await?;
    Ok(Json(days))
}

/// Explicit day creation for today. Photo uploads create days on their
/// own; this covers starting a day before any photo exists. The month
/// mean includes the fresh zero-score day, so the month recalculates.
#[instrument(skip(state))]
pub async fn create_day(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<(StatusCode, Json<UserDay>), ApiError> {
    let day = UserDay::get_or_create(&state.db, user_id, OffsetDateTime::now_utc()).await?;
    if let Some(month_id) = day.month_id {
        UserMonth::recalculate(&state.db, month_id).await?;
    }
    Ok((StatusCode::CREATED, Json(day)))
}

#[instrument(skip(state))]
pub async fn get_day_details(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(date_str): Path<String>,
) -> Result<Json<DayDetailsResponse>, ApiError> {
    let date = Date::parse(&date_str, format_description!("[year]-[month]-[day]"))
        .map_err(|_| ApiError::bad_request("Invalid date format. Expected YYYY-MM-DD"))?;

    let details = services::day_details(&state, user_id, date).await?;
    Ok(Json(details))
}

#[instrument(skip(state))]
pub async fn get_monthly_tracking(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((year, month)): Path<(i32, u8)>,
) -> Result<Json<MonthlyTrackingResponse>, ApiError> {
    let month = Month::try_from(month)
        .map_err(|_| ApiError::bad_request("Invalid month. Expected 1-12"))?;

    let tracking = services::monthly_tracking(&state, user_id, year, month).await?;
    Ok(Json(tracking))
}
