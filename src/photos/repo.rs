use anyhow::Context;
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow, PgPool, Postgres, Transaction};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::ai::normalize::{FoodItemAnalysis, NutrientEntry};

/// One analyzed meal photo. Macro fields are the normalized totals from
/// the AI pipeline; the image bytes live in object storage under
/// `object_key`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Photo {
    pub id: Uuid,
    pub user_id: Uuid,
    pub day_id: Option<Uuid>,
    pub object_key: String,
    pub taken_at: OffsetDateTime,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
    pub cal_kcal: i32,
    pub meal_score: i32,
    pub ai_insight: Option<String>,
    pub created_at: OffsetDateTime,
}

#[derive(Debug)]
pub struct NewPhoto {
    pub id: Uuid,
    pub user_id: Uuid,
    pub day_id: Option<Uuid>,
    pub object_key: String,
    pub taken_at: OffsetDateTime,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
    pub cal_kcal: i32,
    pub meal_score: i32,
    pub ai_insight: String,
}

const PHOTO_COLUMNS: &str = "id, user_id, day_id, object_key, taken_at, protein_g, carbs_g, \
fat_g, cal_kcal, meal_score, ai_insight, created_at";

impl Photo {
    pub async fn insert_tx(
        tx: &mut Transaction<'_, Postgres>,
        new: &NewPhoto,
    ) -> anyhow::Result<Photo> {
        let photo = sqlx::query_as::<_, Photo>(&format!(
            r#"
            INSERT INTO photos
                (id, user_id, day_id, object_key, taken_at, protein_g, carbs_g,
                 fat_g, cal_kcal, meal_score, ai_insight)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {PHOTO_COLUMNS}
            "#,
        ))
        .bind(new.id)
        .bind(new.user_id)
        .bind(new.day_id)
        .bind(&new.object_key)
        .bind(new.taken_at)
        .bind(new.protein_g)
        .bind(new.carbs_g)
        .bind(new.fat_g)
        .bind(new.cal_kcal)
        .bind(new.meal_score)
        .bind(&new.ai_insight)
        .fetch_one(&mut **tx)
        .await
        .context("insert photo")?;
        Ok(photo)
    }

    pub async fn find_owned(
        db: &PgPool,
        id: Uuid,
        user_id: Uuid,
    ) -> anyhow::Result<Option<Photo>> {
        let photo = sqlx::query_as::<_, Photo>(&format!(
            r#"
            SELECT {PHOTO_COLUMNS}
            FROM photos
            WHERE id = $1 AND user_id = $2
            "#,
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(photo)
    }

    /// Photos captured on one calendar date, regardless of day linkage.
    pub async fn list_for_date(
        db: &PgPool,
        user_id: Uuid,
        date: Date,
    ) -> anyhow::Result<Vec<Photo>> {
        let start = date.midnight().assume_utc();
        let end = start + time::Duration::days(1);
        let rows = sqlx::query_as::<_, Photo>(&format!(
            r#"
            SELECT {PHOTO_COLUMNS}
            FROM photos
            WHERE user_id = $1 AND taken_at >= $2 AND taken_at < $3
            ORDER BY taken_at ASC
            "#,
        ))
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    /// Row delete; food items go with it via the FK cascade.
    pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM photos WHERE id = $1")
            .bind(id)
            .execute(db)
            .await
            .context("delete photo")?;
        Ok(())
    }
}

/// A single recognized food item owned by its photo.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FoodItem {
    pub id: Uuid,
    pub photo_id: Uuid,
    pub name: String,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
    pub cal_kcal: i32,
    pub nutrients: Json<Vec<NutrientEntry>>,
    pub created_at: OffsetDateTime,
}

const FOOD_ITEM_COLUMNS: &str =
    "id, photo_id, name, protein_g, carbs_g, fat_g, cal_kcal, nutrients, created_at";

impl FoodItem {
    pub async fn insert_tx(
        tx: &mut Transaction<'_, Postgres>,
        photo_id: Uuid,
        item: &FoodItemAnalysis,
    ) -> anyhow::Result<FoodItem> {
        let row = sqlx::query_as::<_, FoodItem>(&format!(
            r#"
            INSERT INTO food_items
                (id, photo_id, name, protein_g, carbs_g, fat_g, cal_kcal, nutrients)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {FOOD_ITEM_COLUMNS}
            "#,
        ))
        .bind(Uuid::new_v4())
        .bind(photo_id)
        .bind(&item.name)
        .bind(item.protein_g)
        .bind(item.carbs_g)
        .bind(item.fat_g)
        .bind(item.cal_kcal)
        .bind(Json(item.nutrients.clone()))
        .fetch_one(&mut **tx)
        .await
        .with_context(|| format!("insert food item {}", item.name))?;
        Ok(row)
    }

    pub async fn list_by_photo(db: &PgPool, photo_id: Uuid) -> anyhow::Result<Vec<FoodItem>> {
        let rows = sqlx::query_as::<_, FoodItem>(&format!(
            r#"
            SELECT {FOOD_ITEM_COLUMNS}
            FROM food_items
            WHERE photo_id = $1
            ORDER BY created_at ASC
            "#,
        ))
        .bind(photo_id)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }
}
