use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// Biometric profile consumed by the AI prompts and the goal evaluator.
/// Account management itself lives outside this service.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub age: Option<i32>,
    pub weight_kg: Option<f64>,
    pub height_cm: Option<f64>,
    pub gender: Option<String>,
    pub activity_level: Option<String>,
    pub avg_meal_score: f64,
    pub created_at: OffsetDateTime,
}

impl UserProfile {
    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<UserProfile>> {
        let user = sqlx::query_as::<_, UserProfile>(
            r#"
            SELECT id, email, age, weight_kg, height_cm, gender, activity_level,
                   avg_meal_score, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }
}
