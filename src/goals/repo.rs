use anyhow::Context;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// Fitness goal categories, stored as their numeric codes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type,
)]
#[serde(into = "i16", try_from = "i16")]
#[repr(i16)]
pub enum GoalType {
    LoseWeight = 1,
    BuildMuscle = 2,
    ImproveHealth = 3,
    Other = 4,
}

impl GoalType {
    pub fn label(self) -> &'static str {
        match self {
            GoalType::LoseWeight => "Lose Weight",
            GoalType::BuildMuscle => "Build Muscle",
            GoalType::ImproveHealth => "Improve Health",
            GoalType::Other => "Other",
        }
    }
}

impl From<GoalType> for i16 {
    fn from(value: GoalType) -> Self {
        value as i16
    }
}

impl TryFrom<i16> for GoalType {
    type Error = String;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(GoalType::LoseWeight),
            2 => Ok(GoalType::BuildMuscle),
            3 => Ok(GoalType::ImproveHealth),
            4 => Ok(GoalType::Other),
            other => Err(format!("invalid goal type {other}")),
        }
    }
}

/// A user's fitness goal. Superseded goals stay in the table marked
/// inactive + completed; at most one goal per (user, goal_type) is active.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserGoal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub goal_type: GoalType,
    pub target_weight: Option<f64>,
    pub target_score: Option<f64>,
    pub starting_weight: Option<f64>,
    pub starting_score: Option<f64>,
    pub start_date: OffsetDateTime,
    pub end_date: Option<OffsetDateTime>,
    pub objective: Option<String>,
    pub perc_achieved: f64,
    pub active: bool,
    pub completed: bool,
    pub daily_cal_kcal: i32,
    pub daily_protein_g: f64,
    pub daily_fat_g: f64,
    pub daily_carbs_g: f64,
    pub protein_perc: f64,
    pub carbs_perc: f64,
    pub fat_perc: f64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Default)]
pub struct NewGoal {
    pub goal_type: Option<GoalType>,
    pub target_weight: Option<f64>,
    pub target_score: Option<f64>,
    pub starting_weight: Option<f64>,
    pub starting_score: Option<f64>,
    pub objective: Option<String>,
}

/// Fields applied when the two-phase flow finishes; `None` leaves the
/// stored value untouched.
#[derive(Debug)]
pub struct GoalSubmission {
    pub objective: String,
    pub end_date: Option<OffsetDateTime>,
    pub target_weight: Option<f64>,
    pub target_score: Option<f64>,
    pub daily_cal_kcal: Option<i32>,
    pub daily_protein_g: Option<f64>,
    pub daily_fat_g: Option<f64>,
    pub daily_carbs_g: Option<f64>,
    pub protein_perc: Option<f64>,
    pub carbs_perc: Option<f64>,
    pub fat_perc: Option<f64>,
}

const GOAL_COLUMNS: &str = "id, user_id, goal_type, target_weight, target_score, \
starting_weight, starting_score, start_date, end_date, objective, perc_achieved, \
active, completed, daily_cal_kcal, daily_protein_g, daily_fat_g, daily_carbs_g, \
protein_perc, carbs_perc, fat_perc, created_at, updated_at";

impl UserGoal {
    pub async fn list_by_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<UserGoal>> {
        let rows = sqlx::query_as::<_, UserGoal>(&format!(
            r#"
            SELECT {GOAL_COLUMNS}
            FROM user_goals
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        ))
        .bind(user_id)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn find_owned(
        db: &PgPool,
        id: Uuid,
        user_id: Uuid,
    ) -> anyhow::Result<Option<UserGoal>> {
        let goal = sqlx::query_as::<_, UserGoal>(&format!(
            r#"
            SELECT {GOAL_COLUMNS}
            FROM user_goals
            WHERE id = $1 AND user_id = $2
            "#,
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(goal)
    }

    /// Most recent active goal of any type; drives targets and the photo
    /// analysis context.
    pub async fn find_active(db: &PgPool, user_id: Uuid) -> anyhow::Result<Option<UserGoal>> {
        let goal = sqlx::query_as::<_, UserGoal>(&format!(
            r#"
            SELECT {GOAL_COLUMNS}
            FROM user_goals
            WHERE user_id = $1 AND active
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        ))
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(goal)
    }

    /// Mark all active goals of this type inactive + completed; returns
    /// how many were superseded.
    pub async fn supersede_active(
        db: &PgPool,
        user_id: Uuid,
        goal_type: GoalType,
    ) -> anyhow::Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE user_goals
            SET active = false, completed = true, updated_at = now()
            WHERE user_id = $1 AND goal_type = $2 AND active
            "#,
        )
        .bind(user_id)
        .bind(goal_type)
        .execute(db)
        .await
        .context("supersede active goals")?;
        Ok(result.rows_affected())
    }

    pub async fn create(db: &PgPool, user_id: Uuid, new: NewGoal) -> anyhow::Result<UserGoal> {
        let goal_type = new.goal_type.context("goal_type is required")?;
        let goal = sqlx::query_as::<_, UserGoal>(&format!(
            r#"
            INSERT INTO user_goals
                (id, user_id, goal_type, target_weight, target_score,
                 starting_weight, starting_score, objective)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {GOAL_COLUMNS}
            "#,
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(goal_type)
        .bind(new.target_weight)
        .bind(new.target_score)
        .bind(new.starting_weight)
        .bind(new.starting_score)
        .bind(new.objective)
        .fetch_one(db)
        .await
        .context("create user goal")?;
        Ok(goal)
    }

    pub async fn update_submission(
        db: &PgPool,
        id: Uuid,
        submission: &GoalSubmission,
    ) -> anyhow::Result<UserGoal> {
        let goal = sqlx::query_as::<_, UserGoal>(&format!(
            r#"
            UPDATE user_goals
            SET objective = $2,
                end_date = COALESCE($3, end_date),
                target_weight = COALESCE($4, target_weight),
                target_score = COALESCE($5, target_score),
                daily_cal_kcal = COALESCE($6, daily_cal_kcal),
                daily_protein_g = COALESCE($7, daily_protein_g),
                daily_fat_g = COALESCE($8, daily_fat_g),
                daily_carbs_g = COALESCE($9, daily_carbs_g),
                protein_perc = COALESCE($10, protein_perc),
                carbs_perc = COALESCE($11, carbs_perc),
                fat_perc = COALESCE($12, fat_perc),
                updated_at = now()
            WHERE id = $1
            RETURNING {GOAL_COLUMNS}
            "#,
        ))
        .bind(id)
        .bind(&submission.objective)
        .bind(submission.end_date)
        .bind(submission.target_weight)
        .bind(submission.target_score)
        .bind(submission.daily_cal_kcal)
        .bind(submission.daily_protein_g)
        .bind(submission.daily_fat_g)
        .bind(submission.daily_carbs_g)
        .bind(submission.protein_perc)
        .bind(submission.carbs_perc)
        .bind(submission.fat_perc)
        .fetch_one(db)
        .await
        .context("apply goal submission")?;
        Ok(goal)
    }

    pub async fn update_scores(
        db: &PgPool,
        id: Uuid,
        starting_score: Option<f64>,
        target_score: Option<f64>,
    ) -> anyhow::Result<UserGoal> {
        let goal = sqlx::query_as::<_, UserGoal>(&format!(
            r#"
            UPDATE user_goals
            SET starting_score = COALESCE($2, starting_score),
                target_score = COALESCE($3, target_score),
                updated_at = now()
            WHERE id = $1
            RETURNING {GOAL_COLUMNS}
            "#,
        ))
        .bind(id)
        .bind(starting_score)
        .bind(target_score)
        .fetch_one(db)
        .await
        .context("update goal scores")?;
        Ok(goal)
    }

    pub async fn set_progress(db: &PgPool, id: Uuid, perc: f64) -> anyhow::Result<UserGoal> {
        let goal = sqlx::query_as::<_, UserGoal>(&format!(
            r#"
            UPDATE user_goals
            SET perc_achieved = $2, updated_at = now()
            WHERE id = $1
            RETURNING {GOAL_COLUMNS}
            "#,
        ))
        .bind(id)
        .bind(perc)
        .fetch_one(db)
        .await
        .context("persist goal progress")?;
        Ok(goal)
    }

    pub async fn mark_completed(db: &PgPool, id: Uuid) -> anyhow::Result<UserGoal> {
        let goal = sqlx::query_as::<_, UserGoal>(&format!(
            r#"
            UPDATE user_goals
            SET completed = true, active = false, updated_at = now()
            WHERE id = $1
            RETURNING {GOAL_COLUMNS}
            "#,
        ))
        .bind(id)
        .fetch_one(db)
        .await
        .context("mark goal completed")?;
        Ok(goal)
    }

    pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM user_goals WHERE id = $1")
            .bind(id)
            .execute(db)
            .await
            .context("delete user goal")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn goal_type_round_trips_through_codes() {
        for code in 1..=4i16 {
            let gt = GoalType::try_from(code).unwrap();
            assert_eq!(i16::from(gt), code);
        }
        assert!(GoalType::try_from(0).is_err());
        assert!(GoalType::try_from(5).is_err());
    }

    #[test]
    fn goal_type_labels() {
        assert_eq!(GoalType::LoseWeight.label(), "Lose Weight");
        assert_eq!(GoalType::BuildMuscle.label(), "Build Muscle");
        assert_eq!(GoalType::ImproveHealth.label(), "Improve Health");
        assert_eq!(GoalType::Other.label(), "Other");
    }

    #[test]
    fn goal_type_serializes_as_number() {
        assert_eq!(serde_json::to_string(&GoalType::LoseWeight).unwrap(), "1");
        let parsed: GoalType = serde_json::from_str("3").unwrap();
        assert_eq!(parsed, GoalType::ImproveHealth);
        assert!(serde_json::from_str::<GoalType>("9").is_err());
    }
}
