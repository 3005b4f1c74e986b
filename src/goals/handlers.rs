use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, patch, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument};
use uuid::Uuid;

use super::dto::{
    CompleteOrExpireRequest, CreateGoalRequest, MessageResponse, PartialGoalRequest,
    ScoreUpdateRequest, SubmitGoalRequest, SubmitGoalResponse, ValidateGoalRequest,
};
use super::repo::{GoalSubmission, GoalType, NewGoal, UserGoal};
use super::services::{self, GoalAssessment};
use crate::{auth::AuthUser, error::ApiError, state::AppState, users::repo::UserProfile};

pub fn read_routes() -> Router<AppState> {
    Router::new().route("/goals", get(list_goals))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/goals", post(create_goal))
        .route("/goals/partial", post(create_partial_goal))
        .route("/goals/validate", post(validate_goal))
        .route("/goals/complete-or-expire", post(complete_or_expire))
        .route("/goals/:id/submit", patch(submit_goal))
        .route("/goals/:id/scores", patch(update_goal_scores))
        .route("/goals/:id", delete(delete_goal))
}

// --- handlers ---

#[instrument(skip(state))]
pub async fn list_goals(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<UserGoal>>, ApiError> {
    let goals = UserGoal::list_by_user(&state.db, user_id).await?;
    Ok(Json(goals))
}

/// Create a complete goal in one step (alternative to the two-phase flow).
#[instrument(skip(state, body))]
pub async fn create_goal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<CreateGoalRequest>,
) -> Result<(StatusCode, Json<UserGoal>), ApiError> {
    let goal_type = parse_goal_type(body.goal_type)?;
    validate_score(body.target_score)?;
    validate_score(body.starting_score)?;

    let profile = UserProfile::find_by_id(&state.db, user_id).await?;
    let goal = create_with_supersession(
        &state,
        user_id,
        profile.as_ref(),
        NewGoal {
            goal_type: Some(goal_type),
            target_weight: body.target_weight,
            target_score: body.target_score,
            starting_weight: body.starting_weight,
            starting_score: body.starting_score,
            objective: body.objective,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(goal)))
}

/// Phase 1 of the two-phase flow: a goal holding only its type.
#[instrument(skip(state, body))]
pub async fn create_partial_goal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<PartialGoalRequest>,
) -> Result<(StatusCode, Json<UserGoal>), ApiError> {
    let raw = body
        .goal_type
        .ok_or_else(|| ApiError::bad_request("goal_type is required."))?;
    let goal_type = parse_goal_type(raw)?;

    let profile = UserProfile::find_by_id(&state.db, user_id).await?;
    let goal = create_with_supersession(
        &state,
        user_id,
        profile.as_ref(),
        NewGoal {
            goal_type: Some(goal_type),
            ..NewGoal::default()
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(goal)))
}

/// Phase 2: attach the objective, let the planner derive the end date and
/// daily macro targets, and persist them on the goal.
#[instrument(skip(state, body))]
pub async fn submit_goal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(goal_id): Path<Uuid>,
    Json(body): Json<SubmitGoalRequest>,
) -> Result<Json<SubmitGoalResponse>, ApiError> {
    let objective = body
        .objective
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::bad_request("user_objective is required."))?;
    validate_score(body.target_score)?;

    let goal = UserGoal::find_owned(&state.db, goal_id, user_id)
        .await?
        .ok_or_else(|| {
            ApiError::not_found("Goal not found or you don't have permission to modify it.")
        })?;

    let profile = UserProfile::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("profile row missing for authenticated user"))?;

    let assessment =
        services::assess_goal(state.ai.as_ref(), &profile, goal.goal_type, &objective).await;

    let submission = GoalSubmission {
        objective,
        end_date: assessment
            .calculated_end_date
            .map(|d| d.midnight().assume_utc()),
        target_weight: body.target_weight,
        target_score: body.target_score,
        daily_cal_kcal: assessment.daily_cal_kcal.map(|v| v.round() as i32),
        daily_protein_g: assessment.daily_protein_g,
        daily_fat_g: assessment.daily_fat_g,
        daily_carbs_g: assessment.daily_carbs_g,
        protein_perc: assessment.protein_perc,
        carbs_perc: assessment.carbs_perc,
        fat_perc: assessment.fat_perc,
    };
    let goal = UserGoal::update_submission(&state.db, goal.id, &submission).await?;

    let perc =
        services::progress_pct(goal.starting_weight, goal.target_weight, profile.weight_kg);
    let goal = UserGoal::set_progress(&state.db, goal.id, perc).await?;

    Ok(Json(SubmitGoalResponse {
        goal,
        ai_validation: assessment,
    }))
}

/// Run the planner without persisting anything.
#[instrument(skip(state, body))]
pub async fn validate_goal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<ValidateGoalRequest>,
) -> Result<Json<GoalAssessment>, ApiError> {
    let (Some(raw_type), Some(objective)) = (body.goal_type, body.objective.as_deref()) else {
        return Err(ApiError::bad_request(
            "Missing required fields: goal_type and user_objective are required.",
        ));
    };
    let goal_type = parse_goal_type(raw_type)?;
    let objective = objective.trim();
    if objective.is_empty() {
        return Err(ApiError::bad_request(
            "Missing required fields: goal_type and user_objective are required.",
        ));
    }

    let profile = UserProfile::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("profile row missing for authenticated user"))?;

    let assessment =
        services::assess_goal(state.ai.as_ref(), &profile, goal_type, objective).await;
    Ok(Json(assessment))
}

/// On-demand completion check; there is no background sweep.
#[instrument(skip(state, body))]
pub async fn complete_or_expire(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<CompleteOrExpireRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let goal = UserGoal::find_owned(&state.db, body.id, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User goal not found."))?;

    let current_weight = UserProfile::find_by_id(&state.db, user_id)
        .await?
        .and_then(|p| p.weight_kg);

    let perc = services::progress_pct(goal.starting_weight, goal.target_weight, current_weight);
    let goal = UserGoal::set_progress(&state.db, goal.id, perc).await?;

    if services::completion_due(&goal, current_weight, OffsetDateTime::now_utc()) {
        UserGoal::mark_completed(&state.db, goal.id).await?;
        Ok(Json(MessageResponse {
            message: "Goal marked as completed or expired.".to_string(),
        }))
    } else {
        Err(ApiError::bad_request(
            "Goal is still active and not completed.",
        ))
    }
}

#[instrument(skip(state, body))]
pub async fn update_goal_scores(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(goal_id): Path<Uuid>,
    Json(body): Json<ScoreUpdateRequest>,
) -> Result<Json<UserGoal>, ApiError> {
    validate_score(body.starting_score)?;
    validate_score(body.target_score)?;

    let goal = UserGoal::find_owned(&state.db, goal_id, user_id)
        .await?
        .ok_or_else(|| {
            ApiError::not_found("Goal not found or you don't have permission to modify it.")
        })?;

    let goal =
        UserGoal::update_scores(&state.db, goal.id, body.starting_score, body.target_score)
            .await?;
    Ok(Json(goal))
}

#[instrument(skip(state))]
pub async fn delete_goal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(goal_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let goal = UserGoal::find_owned(&state.db, goal_id, user_id)
        .await?
        .ok_or_else(|| {
            ApiError::not_found("Goal not found or you don't have permission to delete it.")
        })?;

    UserGoal::delete(&state.db, goal.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- helpers ---

/// Supersede any active goal of the same type, fill starting values from
/// the profile, create the goal, and seed its progress percentage.
async fn create_with_supersession(
    state: &AppState,
    user_id: Uuid,
    profile: Option<&UserProfile>,
    mut new: NewGoal,
) -> Result<UserGoal, ApiError> {
    let goal_type = new
        .goal_type
        .ok_or_else(|| ApiError::bad_request("goal_type is required."))?;

    let superseded = UserGoal::supersede_active(&state.db, user_id, goal_type).await?;
    if superseded > 0 {
        info!(count = superseded, goal_type = ?goal_type, %user_id, "superseded active goals");
    }

    let current_weight = profile.and_then(|p| p.weight_kg);
    if new.starting_weight.is_none() {
        new.starting_weight = current_weight;
    }
    if new.starting_score.is_none() {
        new.starting_score = profile.map(|p| p.avg_meal_score);
    }

    let goal = UserGoal::create(&state.db, user_id, new).await?;
    let perc = services::progress_pct(goal.starting_weight, goal.target_weight, current_weight);
    let goal = UserGoal::set_progress(&state.db, goal.id, perc).await?;
    Ok(goal)
}

fn parse_goal_type(raw: i16) -> Result<GoalType, ApiError> {
    GoalType::try_from(raw)
        .map_err(|_| ApiError::bad_request("goal_type must be between 1 and 4."))
}

fn validate_score(score: Option<f64>) -> Result<(), ApiError> {
    match score {
        Some(s) if !(1.0..=10.0).contains(&s) => Err(ApiError::bad_request(
            "Scores must be between 1 and 10.",
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn goal_type_parsing_bounds() {
        assert!(parse_goal_type(1).is_ok());
        assert!(parse_goal_type(4).is_ok());
        assert!(parse_goal_type(0).is_err());
        assert!(parse_goal_type(5).is_err());
    }

    #[test]
    fn score_validation_bounds() {
        assert!(validate_score(None).is_ok());
        assert!(validate_score(Some(1.0)).is_ok());
        assert!(validate_score(Some(10.0)).is_ok());
        assert!(validate_score(Some(0.5)).is_err());
        assert!(validate_score(Some(10.5)).is_err());
    }
}
