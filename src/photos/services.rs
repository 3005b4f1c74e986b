use anyhow::Context;
use bytes::Bytes;
use sqlx::PgPool;
use time::OffsetDateTime;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::dto::{
    AnalyzeResponse, FoodItemOut, GoalEcho, PhotoItemsResponse, PhotoOut, ProfileOut,
};
use super::repo::{FoodItem, NewPhoto, Photo};
use crate::ai::normalize::{normalize_response, MealAnalysis};
use crate::ai::{self, prompts};
use crate::days::repo::UserDay;
use crate::error::ApiError;
use crate::goals::repo::UserGoal;
use crate::state::AppState;
use crate::storage::{ext_from_mime, photo_key};
use crate::users::repo::UserProfile;

const PHOTO_URL_TTL_SECS: u64 = 30 * 60;

pub struct UploadedImage {
    pub bytes: Bytes,
    pub content_type: String,
}

/// The full analyze-and-save flow: vision round-trip, normalization,
/// object upload, photo + food item persistence, then the day/month
/// recalculation cascade. AI failure surfaces as a non-crashing error
/// response; a persistence failure after upload removes the uploaded
/// object so storage never holds orphans.
pub async fn analyze_and_save(
    state: &AppState,
    user_id: Uuid,
    image: UploadedImage,
) -> Result<AnalyzeResponse, ApiError> {
    let profile = UserProfile::find_by_id(&state.db, user_id).await?;
    let goal = UserGoal::find_active(&state.db, user_id).await?;

    let data_url = ai::image_data_url(&image.bytes, &image.content_type);
    let system_prompt = prompts::meal_system_prompt(profile.as_ref(), goal.as_ref());
    let raw = state
        .ai
        .analyze_image(&system_prompt, prompts::MEAL_USER_INSTRUCTION, &data_url)
        .await
        .map_err(|e| {
            error!(error = %e, %user_id, "ai analysis request failed");
            ApiError::Upstream("AI analysis request failed.".to_string())
        })?;

    let analysis = normalize_response(&raw);

    let photo_id = Uuid::new_v4();
    let ext = ext_from_mime(&image.content_type).unwrap_or("jpg");
    let key = photo_key(user_id, photo_id, ext);
    state
        .storage
        .put_object(&key, image.bytes, &image.content_type)
        .await
        .with_context(|| format!("store meal photo {key}"))?;

    let now = OffsetDateTime::now_utc();
    let (photo, items, day) =
        match persist_analysis(&state.db, user_id, photo_id, &key, now, &analysis).await {
            Ok(v) => v,
            Err(e) => {
                // don't leave the uploaded object orphaned
                if let Err(cleanup) = state.storage.delete_object(&key).await {
                    warn!(error = %cleanup, %key, "orphan photo cleanup failed");
                }
                return Err(ApiError::from(e));
            }
        };

    let day = UserDay::recalculate(&state.db, day.id).await?;
    info!(photo_id = %photo.id, day_id = %day.id, items = items.len(), "meal photo analyzed");

    let image_url = match state.storage.presign_get(&key, PHOTO_URL_TTL_SECS).await {
        Ok(url) => Some(url),
        Err(e) => {
            warn!(error = %e, %key, "presign failed");
            None
        }
    };

    Ok(build_response(
        &photo,
        &items,
        day.id,
        image_url,
        &analysis,
        profile.as_ref(),
        goal.as_ref(),
    ))
}

async fn persist_analysis(
    db: &PgPool,
    user_id: Uuid,
    photo_id: Uuid,
    object_key: &str,
    now: OffsetDateTime,
    analysis: &MealAnalysis,
) -> anyhow::Result<(Photo, Vec<FoodItem>, UserDay)> {
    let day = UserDay::get_or_create(db, user_id, now).await?;

    let mut tx = db.begin().await.context("begin tx")?;
    let photo = Photo::insert_tx(
        &mut tx,
        &NewPhoto {
            id: photo_id,
            user_id,
            day_id: Some(day.id),
            object_key: object_key.to_string(),
            taken_at: now,
            protein_g: analysis.protein_g,
            carbs_g: analysis.carbs_g,
            fat_g: analysis.fat_g,
            cal_kcal: analysis.cal_kcal,
            meal_score: analysis.meal_score,
            ai_insight: analysis.ai_insight.clone(),
        },
    )
    .await?;

    let mut items = Vec::with_capacity(analysis.food_items.len());
    for item in &analysis.food_items {
        items.push(FoodItem::insert_tx(&mut tx, photo.id, item).await?);
    }
    tx.commit().await.context("commit tx")?;

    Ok((photo, items, day))
}

fn build_response(
    photo: &Photo,
    items: &[FoodItem],
    day_id: Uuid,
    image_url: Option<String>,
    analysis: &MealAnalysis,
    profile: Option<&UserProfile>,
    goal: Option<&UserGoal>,
) -> AnalyzeResponse {
    AnalyzeResponse {
        id: photo.id,
        user_day_id: day_id,
        image_url,
        protein_g: analysis.protein_g,
        carbs_g: analysis.carbs_g,
        fat_g: analysis.fat_g,
        cal_kcal: analysis.cal_kcal,
        meal_score: analysis.meal_score,
        ai_insight: analysis.ai_insight.clone(),
        food_items: items.iter().map(FoodItemOut::from).collect(),
        created_food_items_count: items.len(),
        has_user_goal: goal.is_some(),
        user_profile: profile.map(ProfileOut::from),
        user_goal: goal.map(GoalEcho::from),
    }
}

/// Delete a photo and cascade: food items go via the FK, the stored
/// object is removed best-effort, and the owning day recalculates.
pub async fn delete_photo(
    state: &AppState,
    user_id: Uuid,
    photo_id: Uuid,
) -> Result<(), ApiError> {
    let photo = Photo::find_owned(&state.db, photo_id, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Photo not found"))?;

    Photo::delete(&state.db, photo.id).await?;

    if let Err(e) = state.storage.delete_object(&photo.object_key).await {
        warn!(error = %e, key = %photo.object_key, "stored object deletion failed");
    }

    if let Some(day_id) = photo.day_id {
        UserDay::recalculate(&state.db, day_id).await?;
    }

    info!(%photo_id, %user_id, "photo deleted");
    Ok(())
}

pub async fn photo_items(
    state: &AppState,
    user_id: Uuid,
    photo_id: Uuid,
) -> Result<PhotoItemsResponse, ApiError> {
    let photo = Photo::find_owned(&state.db, photo_id, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Photo not found"))?;

    let items = FoodItem::list_by_photo(&state.db, photo.id).await?;

    let image_url = match state
        .storage
        .presign_get(&photo.object_key, PHOTO_URL_TTL_SECS)
        .await
    {
        Ok(url) => Some(url),
        Err(e) => {
            warn!(error = %e, key = %photo.object_key, "presign failed");
            None
        }
    };

    Ok(PhotoItemsResponse {
        photo: PhotoOut::from_photo(&photo, image_url),
        food_items: items.iter().map(FoodItemOut::from).collect(),
        food_items_count: items.len(),
    })
}
