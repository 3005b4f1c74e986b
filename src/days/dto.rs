use serde::Serialize;
use uuid::Uuid;

use crate::goals::dto::DailyTargets;
use crate::photos::dto::PhotoOut;

/// One cell of the monthly calendar grid. Cells outside the requested
/// month (padding to complete weeks) carry `is_current_month = false`;
/// cells without a tracked day carry nulls and `has_data = false`.
#[derive(Debug, Clone, Serialize)]
pub struct DayCell {
    pub date: String,
    pub day_of_month: u8,
    pub is_current_month: bool,
    pub calories: Option<i32>,
    pub protein: Option<f64>,
    pub carbs: Option<f64>,
    pub fat: Option<f64>,
    pub meal_score: Option<f64>,
    pub has_data: bool,
}

#[derive(Debug, Serialize)]
pub struct MonthInfo {
    pub year: i32,
    pub month: u8,
    pub month_name: String,
    pub month_year: String,
}

#[derive(Debug, Serialize)]
pub struct MonthlyTrackingResponse {
    pub month_info: MonthInfo,
    pub weeks: Vec<Vec<DayCell>>,
    pub goal_data: Option<DailyTargets>,
    pub has_prev_month: bool,
    pub has_next_month: bool,
}

#[derive(Debug, Serialize)]
pub struct DayData {
    pub id: Uuid,
    pub date: String,
    pub tot_cal_kcal: i32,
    pub tot_protein_g: f64,
    pub tot_carbs_g: f64,
    pub tot_fat_g: f64,
    pub meal_score_avg: f64,
}

#[derive(Debug, Serialize)]
pub struct DayDetailsResponse {
    pub day_data: Option<DayData>,
    pub photos: Vec<PhotoOut>,
    pub goal_data: Option<DailyTargets>,
    pub date: String,
}
