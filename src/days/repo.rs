use anyhow::Context;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::services;
use crate::months::repo::UserMonth;

/// Day-level rollup over the photos taken on one calendar date. Totals are
/// cached aggregates, recomputed in full on any child photo write.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserDay {
    pub id: Uuid,
    pub user_id: Uuid,
    pub month_id: Option<Uuid>,
    pub day_date: Date,
    pub tot_cal_kcal: i32,
    pub tot_protein_g: f64,
    pub tot_carbs_g: f64,
    pub tot_fat_g: f64,
    pub meal_score_avg: f64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

const DAY_COLUMNS: &str = "id, user_id, month_id, day_date, tot_cal_kcal, tot_protein_g, \
tot_carbs_g, tot_fat_g, meal_score_avg, created_at, updated_at";

impl UserDay {
    pub async fn find_by_date(
        db: &PgPool,
        user_id: Uuid,
        day_date: Date,
    ) -> anyhow::Result<Option<UserDay>> {
        let day = sqlx::query_as::<_, UserDay>(&format!(
            r#"
            SELECT {DAY_COLUMNS}
            FROM user_days
            WHERE user_id = $1 AND day_date = $2
            "#,
        ))
        .bind(user_id)
        .bind(day_date)
        .fetch_optional(db)
        .await?;
        Ok(day)
    }

    pub async fn list_by_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<UserDay>> {
        let rows = sqlx::query_as::<_, UserDay>(&format!(
            r#"
            SELECT {DAY_COLUMNS}
            FROM user_days
            WHERE user_id = $1
            ORDER BY day_date DESC
            "#,
        ))
        .bind(user_id)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn list_in_range(
        db: &PgPool,
        user_id: Uuid,
        from: Date,
        to: Date,
    ) -> anyhow::Result<Vec<UserDay>> {
        let rows = sqlx::query_as::<_, UserDay>(&format!(
            r#"
            SELECT {DAY_COLUMNS}
            FROM user_days
            WHERE user_id = $1 AND day_date BETWEEN $2 AND $3
            ORDER BY day_date ASC
            "#,
        ))
        .bind(user_id)
        .bind(from)
        .bind(to)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn exists_in_range(
        db: &PgPool,
        user_id: Uuid,
        from: Date,
        to: Date,
    ) -> anyhow::Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM user_days
                WHERE user_id = $1 AND day_date BETWEEN $2 AND $3
            )
            "#,
        )
        .bind(user_id)
        .bind(from)
        .bind(to)
        .fetch_one(db)
        .await?;
        Ok(exists)
    }

    /// Resolve (user, calendar-date) to its day row, creating the day and
    /// its owning month as needed. The insert is an atomic
    /// insert-or-fetch against the (user_id, day_date) unique key, so two
    /// concurrent uploads for a fresh day converge on one row.
    pub async fn get_or_create(
        db: &PgPool,
        user_id: Uuid,
        at: OffsetDateTime,
    ) -> anyhow::Result<UserDay> {
        let day_date = at.date();
        if let Some(existing) = Self::find_by_date(db, user_id, day_date).await? {
            return Ok(existing);
        }

        let (start_date, end_date) = services::month_bounds(day_date)?;
        let title = services::month_title(day_date)?;
        let month = UserMonth::get_or_create(db, user_id, &title, start_date, end_date).await?;

        let day = sqlx::query_as::<_, UserDay>(&format!(
            r#"
            INSERT INTO user_days (id, user_id, month_id, day_date)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, day_date) DO UPDATE SET updated_at = now()
            RETURNING {DAY_COLUMNS}
            "#,
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(month.id)
        .bind(day_date)
        .fetch_one(db)
        .await
        .context("get or create user day")?;
        Ok(day)
    }

    /// Full recomputation over the linked photos, then cascade upward to
    /// the owning month. An empty photo set resets the totals to zero.
    pub async fn recalculate(db: &PgPool, day_id: Uuid) -> anyhow::Result<UserDay> {
        let photos: Vec<(i32, f64, f64, f64, i32)> = sqlx::query_as(
            r#"
            SELECT cal_kcal, protein_g, carbs_g, fat_g, meal_score
            FROM photos
            WHERE day_id = $1
            "#,
        )
        .bind(day_id)
        .fetch_all(db)
        .await
        .context("load photos for day recalculation")?;

        let tot_cal: i64 = photos.iter().map(|p| i64::from(p.0)).sum();
        let tot_protein: f64 = photos.iter().map(|p| p.1).sum();
        let tot_carbs: f64 = photos.iter().map(|p| p.2).sum();
        let tot_fat: f64 = photos.iter().map(|p| p.3).sum();
        let score_avg = if photos.is_empty() {
            0.0
        } else {
            photos.iter().map(|p| f64::from(p.4)).sum::<f64>() / photos.len() as f64
        };

        let day = sqlx::query_as::<_, UserDay>(&format!(
            r#"
            UPDATE user_days
            SET tot_cal_kcal = $2, tot_protein_g = $3, tot_carbs_g = $4, tot_fat_g = $5,
                meal_score_avg = $6, updated_at = now()
            WHERE id = $1
            RETURNING {DAY_COLUMNS}
            "#,
        ))
        .bind(day_id)
        .bind(tot_cal as i32)
        .bind(tot_protein)
        .bind(tot_carbs)
        .bind(tot_fat)
        .bind(score_avg)
        .fetch_one(db)
        .await
        .context("persist day aggregates")?;

        if let Some(month_id) = day.month_id {
            UserMonth::recalculate(db, month_id).await?;
        }
        Ok(day)
    }
}
