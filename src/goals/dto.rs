use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::repo::UserGoal;
use super::services::GoalAssessment;

/// Daily macro targets echoed into the tracking and day-detail views.
#[derive(Debug, Serialize)]
pub struct DailyTargets {
    pub daily_calories: i32,
    pub daily_protein: f64,
    pub daily_carbs: f64,
    pub daily_fat: f64,
    pub goal_type: String,
}

impl From<&UserGoal> for DailyTargets {
    fn from(goal: &UserGoal) -> Self {
        Self {
            daily_calories: goal.daily_cal_kcal,
            daily_protein: goal.daily_protein_g,
            daily_carbs: goal.daily_carbs_g,
            daily_fat: goal.daily_fat_g,
            goal_type: goal.goal_type.label().to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateGoalRequest {
    pub goal_type: i16,
    pub target_weight: Option<f64>,
    pub target_score: Option<f64>,
    pub starting_weight: Option<f64>,
    pub starting_score: Option<f64>,
    pub objective: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PartialGoalRequest {
    pub goal_type: Option<i16>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitGoalRequest {
    pub objective: Option<String>,
    pub target_weight: Option<f64>,
    pub target_score: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct ValidateGoalRequest {
    pub goal_type: Option<i16>,
    pub objective: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CompleteOrExpireRequest {
    pub id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ScoreUpdateRequest {
    pub starting_score: Option<f64>,
    pub target_score: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct SubmitGoalResponse {
    #[serde(flatten)]
    pub goal: UserGoal,
    pub ai_validation: GoalAssessment,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goals::repo::GoalType;
    use time::OffsetDateTime;

    #[test]
    fn daily_targets_carry_goal_label() {
        let now = OffsetDateTime::now_utc();
        let goal = UserGoal {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            goal_type: GoalType::BuildMuscle,
            target_weight: None,
            target_score: None,
            starting_weight: None,
            starting_score: None,
            start_date: now,
            end_date: None,
            objective: None,
            perc_achieved: 0.0,
            active: true,
            completed: false,
            daily_cal_kcal: 2400,
            daily_protein_g: 168.0,
            daily_fat_g: 59.0,
            daily_carbs_g: 120.0,
            protein_perc: 0.28,
            carbs_perc: 0.5,
            fat_perc: 0.22,
            created_at: now,
            updated_at: now,
        };

        let targets = DailyTargets::from(&goal);
        assert_eq!(targets.daily_calories, 2400);
        assert_eq!(targets.goal_type, "Build Muscle");

        let json = serde_json::to_string(&targets).unwrap();
        assert!(json.contains("Build Muscle"));
    }
}
