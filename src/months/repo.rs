use anyhow::Context;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

/// Month-level rollup. Totals are cached aggregates over the child days,
/// recomputed in full whenever a child day changes.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserMonth {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub start_date: Date,
    pub end_date: Date,
    pub tot_cal_kcal: i32,
    pub tot_protein_g: f64,
    pub tot_carbs_g: f64,
    pub tot_fat_g: f64,
    pub meal_score_avg: f64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

const MONTH_COLUMNS: &str = "id, user_id, title, start_date, end_date, tot_cal_kcal, \
tot_protein_g, tot_carbs_g, tot_fat_g, meal_score_avg, created_at, updated_at";

impl UserMonth {
    pub async fn list_by_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<UserMonth>> {
        let rows = sqlx::query_as::<_, UserMonth>(&format!(
            r#"
            SELECT {MONTH_COLUMNS}
            FROM user_months
            WHERE user_id = $1
            ORDER BY start_date DESC
            "#,
        ))
        .bind(user_id)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    /// Atomic insert-or-fetch keyed on (user_id, title). Concurrent callers
    /// resolve to the same row through the unique constraint.
    pub async fn get_or_create(
        db: &PgPool,
        user_id: Uuid,
        title: &str,
        start_date: Date,
        end_date: Date,
    ) -> anyhow::Result<UserMonth> {
        let month = sqlx::query_as::<_, UserMonth>(&format!(
            r#"
            INSERT INTO user_months (id, user_id, title, start_date, end_date)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, title) DO UPDATE SET updated_at = now()
            RETURNING {MONTH_COLUMNS}
            "#,
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(title)
        .bind(start_date)
        .bind(end_date)
        .fetch_one(db)
        .await
        .context("get or create user month")?;
        Ok(month)
    }

    /// Full recomputation over the child days: exact sums for the four
    /// totals, arithmetic mean of the day meal scores (0.0 with no days).
    pub async fn recalculate(db: &PgPool, month_id: Uuid) -> anyhow::Result<UserMonth> {
        let days: Vec<(i32, f64, f64, f64, f64)> = sqlx::query_as(
            r#"
            SELECT tot_cal_kcal, tot_protein_g, tot_carbs_g, tot_fat_g, meal_score_avg
            FROM user_days
            WHERE month_id = $1
            "#,
        )
        .bind(month_id)
        .fetch_all(db)
        .await
        .context("load days for month recalculation")?;

        let tot_cal: i64 = days.iter().map(|d| i64::from(d.0)).sum();
        let tot_protein: f64 = days.iter().map(|d| d.1).sum();
        let tot_carbs: f64 = days.iter().map(|d| d.2).sum();
        let tot_fat: f64 = days.iter().map(|d| d.3).sum();
        let score_avg = if days.is_empty() {
            0.0
        } else {
            days.iter().map(|d| d.4).sum::<f64>() / days.len() as f64
        };

        let month = sqlx::query_as::<_, UserMonth>(&format!(
            r#"
            UPDATE user_months
            SET tot_cal_kcal = $2, tot_protein_g = $3, tot_carbs_g = $4, tot_fat_g = $5,
                meal_score_avg = $6, updated_at = now()
            WHERE id = $1
            RETURNING {MONTH_COLUMNS}
            "#,
        ))
        .bind(month_id)
        .bind(tot_cal as i32)
        .bind(tot_protein)
        .bind(tot_carbs)
        .bind(tot_fat)
        .bind(score_avg)
        .fetch_one(db)
        .await
        .context("persist month aggregates")?;
        Ok(month)
    }
}
