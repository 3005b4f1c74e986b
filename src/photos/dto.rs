use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo::{FoodItem, Photo};
use crate::ai::normalize::NutrientEntry;
use crate::goals::repo::UserGoal;
use crate::users::repo::UserProfile;

#[derive(Debug, Serialize)]
pub struct PhotoOut {
    pub id: Uuid,
    pub image_url: Option<String>,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
    pub cal_kcal: i32,
    pub meal_score: i32,
    pub ai_insight: Option<String>,
    pub taken_at: OffsetDateTime,
}

impl PhotoOut {
    pub fn from_photo(photo: &Photo, image_url: Option<String>) -> Self {
        Self {
            id: photo.id,
            image_url,
            protein_g: photo.protein_g,
            carbs_g: photo.carbs_g,
            fat_g: photo.fat_g,
            cal_kcal: photo.cal_kcal,
            meal_score: photo.meal_score,
            ai_insight: photo.ai_insight.clone(),
            taken_at: photo.taken_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FoodItemOut {
    pub id: Uuid,
    pub name: String,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
    pub cal_kcal: i32,
    pub nutrients: Vec<NutrientEntry>,
}

impl From<&FoodItem> for FoodItemOut {
    fn from(item: &FoodItem) -> Self {
        Self {
            id: item.id,
            name: item.name.clone(),
            protein_g: item.protein_g,
            carbs_g: item.carbs_g,
            fat_g: item.fat_g,
            cal_kcal: item.cal_kcal,
            nutrients: item.nutrients.0.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProfileOut {
    pub age: Option<i32>,
    pub weight: Option<f64>,
    pub height: Option<f64>,
    pub gender: Option<String>,
    pub activity_level: Option<String>,
}

impl From<&UserProfile> for ProfileOut {
    fn from(p: &UserProfile) -> Self {
        Self {
            age: p.age,
            weight: p.weight_kg,
            height: p.height_cm,
            gender: p.gender.clone(),
            activity_level: p.activity_level.clone(),
        }
    }
}

/// Echo of the active goal the analysis was scored against.
#[derive(Debug, Serialize)]
pub struct GoalEcho {
    #[serde(rename = "type")]
    pub goal_type: String,
    pub objective: Option<String>,
}

impl From<&UserGoal> for GoalEcho {
    fn from(goal: &UserGoal) -> Self {
        Self {
            goal_type: goal.goal_type.label().to_string(),
            objective: goal.objective.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub id: Uuid,
    pub user_day_id: Uuid,
    pub image_url: Option<String>,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
    pub cal_kcal: i32,
    pub meal_score: i32,
    pub ai_insight: String,
    pub food_items: Vec<FoodItemOut>,
    pub created_food_items_count: usize,
    pub has_user_goal: bool,
    pub user_profile: Option<ProfileOut>,
    pub user_goal: Option<GoalEcho>,
}

#[derive(Debug, Serialize)]
pub struct PhotoItemsResponse {
    pub photo: PhotoOut,
    pub food_items: Vec<FoodItemOut>,
    pub food_items_count: usize,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goals::repo::GoalType;

    #[test]
    fn goal_echo_serializes_type_key() {
        let now = OffsetDateTime::now_utc();
        let goal = UserGoal {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            goal_type: GoalType::LoseWeight,
            target_weight: None,
            target_score: None,
            starting_weight: None,
            starting_score: None,
            start_date: now,
            end_date: None,
            objective: Some("lose 5kg in 3 months".into()),
            perc_achieved: 0.0,
            active: true,
            completed: false,
            daily_cal_kcal: 0,
            daily_protein_g: 0.0,
            daily_fat_g: 0.0,
            daily_carbs_g: 0.0,
            protein_perc: 0.0,
            carbs_perc: 0.0,
            fat_perc: 0.0,
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_value(GoalEcho::from(&goal)).unwrap();
        assert_eq!(json["type"], "Lose Weight");
        assert_eq!(json["objective"], "lose 5kg in 3 months");
    }
}
