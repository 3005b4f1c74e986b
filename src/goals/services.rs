use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use time::{Date, Duration, OffsetDateTime};
use tracing::{error, warn};

use super::repo::{GoalType, UserGoal};
use crate::ai::{prompts, NutritionAi};
use crate::users::repo::UserProfile;

/// Progress toward a weight goal as a percentage.
///
/// Returns 100 when start and target coincide, 0 when any of the three
/// weights is unknown, and clamps to [0, 100] otherwise.
pub fn progress_pct(starting: Option<f64>, target: Option<f64>, current: Option<f64>) -> f64 {
    let (Some(starting), Some(target), Some(current)) = (starting, target, current) else {
        return 0.0;
    };
    if starting == target {
        return 100.0;
    }
    (((current - starting).abs() / (target - starting).abs()) * 100.0).clamp(0.0, 100.0)
}

/// Whether a goal should flip to completed: its end date passed, progress
/// reached 100%, or the current weight sits exactly on the target.
pub fn completion_due(goal: &UserGoal, current_weight: Option<f64>, now: OffsetDateTime) -> bool {
    let expired = goal.end_date.map_or(false, |end| end < now);
    let achieved = goal.perc_achieved >= 100.0;
    let at_target =
        matches!((goal.target_weight, current_weight), (Some(t), Some(c)) if c == t);
    expired || achieved || at_target
}

lazy_static! {
    static ref NUMBERED_TIMEFRAMES: [(Regex, i64); 4] = [
        (Regex::new(r"(\d+)\s*days?").unwrap(), 1),
        (Regex::new(r"(\d+)\s*weeks?").unwrap(), 7),
        (Regex::new(r"(\d+)\s*months?").unwrap(), 30),
        (Regex::new(r"(\d+)\s*years?").unwrap(), 365),
    ];
    static ref BARE_TIMEFRAMES: [(Regex, i64); 3] = [
        (Regex::new(r"a\s*week").unwrap(), 7),
        (Regex::new(r"a\s*month").unwrap(), 30),
        (Regex::new(r"a\s*year").unwrap(), 365),
    ];
}

/// Pull an intended timeframe out of free-text like "lose 5kg in 3 months".
/// Fixed multipliers: week = 7, month = 30, year = 365 days.
pub fn extract_timeframe_days(text: &str) -> Option<i64> {
    let text = text.to_lowercase();
    for (re, multiplier) in NUMBERED_TIMEFRAMES.iter() {
        if let Some(caps) = re.captures(&text) {
            if let Ok(n) = caps[1].parse::<i64>() {
                return Some(n * multiplier);
            }
        }
    }
    for (re, multiplier) in BARE_TIMEFRAMES.iter() {
        if re.is_match(&text) {
            return Some(*multiplier);
        }
    }
    None
}

/// Feasibility judgment + daily macro targets from the reasoning service.
/// Every field is optional on the wire; defaults keep a partial response
/// usable instead of failing the whole call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalAssessment {
    #[serde(default)]
    pub is_reasonable: bool,
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub suggestion: Option<String>,
    #[serde(default)]
    pub extracted_timeframe: Option<String>,
    #[serde(default)]
    pub timeframe_days: Option<f64>,
    #[serde(default)]
    pub calculated_end_date: Option<Date>,
    #[serde(default)]
    pub daily_cal_kcal: Option<f64>,
    #[serde(default)]
    pub daily_protein_g: Option<f64>,
    #[serde(default)]
    pub daily_fat_g: Option<f64>,
    #[serde(default)]
    pub daily_carbs_g: Option<f64>,
    #[serde(default)]
    pub protein_perc: Option<f64>,
    #[serde(default)]
    pub carbs_perc: Option<f64>,
    #[serde(default)]
    pub fat_perc: Option<f64>,
}

impl GoalAssessment {
    /// Terminal fallback when the reasoning service misbehaves: the caller
    /// still receives a well-formed assessment, never an error.
    pub fn unavailable(detail: &str) -> Self {
        Self {
            is_reasonable: false,
            feedback: format!("AI service temporarily unavailable: {detail}"),
            suggestion: Some(
                "Please try again later or consult with a fitness professional.".to_string(),
            ),
            extracted_timeframe: None,
            timeframe_days: None,
            calculated_end_date: None,
            daily_cal_kcal: None,
            daily_protein_g: None,
            daily_fat_g: None,
            daily_carbs_g: None,
            protein_perc: None,
            carbs_perc: None,
            fat_perc: None,
        }
    }
}

/// Run the goal through the reasoning service. The regex-extracted
/// timeframe backs up a missing model timeframe, and the end date is
/// derived from today when a timeframe is known.
pub async fn assess_goal(
    ai: &dyn NutritionAi,
    profile: &UserProfile,
    goal_type: GoalType,
    objective: &str,
) -> GoalAssessment {
    let user_prompt = prompts::goal_validation_user_prompt(profile, goal_type.label(), objective);

    let raw = match ai
        .complete_json(prompts::GOAL_VALIDATION_SYSTEM, &user_prompt)
        .await
    {
        Ok(raw) => raw,
        Err(e) => {
            error!(error = %e, "goal validation request failed");
            return GoalAssessment::unavailable(&e.to_string());
        }
    };

    let mut assessment: GoalAssessment = match serde_json::from_str(&raw) {
        Ok(a) => a,
        Err(e) => {
            warn!(error = %e, "goal validation response was not valid JSON");
            return GoalAssessment::unavailable("malformed response");
        }
    };

    if assessment.timeframe_days.is_none() {
        assessment.timeframe_days = extract_timeframe_days(objective).map(|d| d as f64);
    }
    assessment.calculated_end_date = assessment
        .timeframe_days
        .map(|d| OffsetDateTime::now_utc().date() + Duration::days(d.round() as i64));

    assessment
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn progress_halfway() {
        assert_eq!(progress_pct(Some(80.0), Some(70.0), Some(75.0)), 50.0);
    }

    #[test]
    fn progress_at_target_is_complete() {
        assert_eq!(progress_pct(Some(80.0), Some(70.0), Some(70.0)), 100.0);
    }

    #[test]
    fn progress_equal_start_and_target() {
        assert_eq!(progress_pct(Some(70.0), Some(70.0), Some(99.0)), 100.0);
    }

    #[test]
    fn progress_missing_inputs_is_zero() {
        assert_eq!(progress_pct(None, Some(70.0), Some(75.0)), 0.0);
        assert_eq!(progress_pct(Some(80.0), None, Some(75.0)), 0.0);
        assert_eq!(progress_pct(Some(80.0), Some(70.0), None), 0.0);
    }

    #[test]
    fn progress_overshoot_clamps_to_100() {
        assert_eq!(progress_pct(Some(80.0), Some(70.0), Some(60.0)), 100.0);
    }

    #[test]
    fn timeframe_numbered_units() {
        assert_eq!(
            extract_timeframe_days("I want to lose 5kg in 3 months"),
            Some(90)
        );
        assert_eq!(extract_timeframe_days("in 10 days"), Some(10));
        assert_eq!(extract_timeframe_days("over 2 weeks please"), Some(14));
        assert_eq!(extract_timeframe_days("within 1 year"), Some(365));
    }

    #[test]
    fn timeframe_bare_units() {
        assert_eq!(extract_timeframe_days("get shredded in a week"), Some(7));
        assert_eq!(extract_timeframe_days("In A Month"), Some(30));
        assert_eq!(extract_timeframe_days("maybe a year from now"), Some(365));
    }

    #[test]
    fn timeframe_absent() {
        assert_eq!(extract_timeframe_days("I just want to feel better"), None);
    }

    fn goal(end_date: Option<OffsetDateTime>, perc: f64, target: Option<f64>) -> UserGoal {
        let now = OffsetDateTime::now_utc();
        UserGoal {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            goal_type: GoalType::LoseWeight,
            target_weight: target,
            target_score: None,
            starting_weight: Some(80.0),
            starting_score: None,
            start_date: now,
            end_date,
            objective: None,
            perc_achieved: perc,
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
        }
    }

    #[test]
    fn completion_due_on_expiry() {
        let now = OffsetDateTime::now_utc();
        let expired = goal(Some(now - Duration::days(1)), 10.0, Some(70.0));
        assert!(completion_due(&expired, Some(78.0), now));

        let running = goal(Some(now + Duration::days(1)), 10.0, Some(70.0));
        assert!(!completion_due(&running, Some(78.0), now));
    }

    #[test]
    fn completion_due_on_full_progress() {
        let now = OffsetDateTime::now_utc();
        assert!(completion_due(&goal(None, 100.0, Some(70.0)), None, now));
        assert!(!completion_due(&goal(None, 99.9, Some(70.0)), None, now));
    }

    #[test]
    fn completion_due_on_exact_target_weight() {
        let now = OffsetDateTime::now_utc();
        assert!(completion_due(&goal(None, 0.0, Some(70.0)), Some(70.0), now));
        assert!(!completion_due(&goal(None, 0.0, Some(70.0)), Some(70.5), now));
    }

    #[test]
    fn unavailable_assessment_is_well_formed() {
        let a = GoalAssessment::unavailable("connection refused");
        assert!(!a.is_reasonable);
        assert!(a.feedback.contains("temporarily unavailable"));
        assert!(a.suggestion.is_some());
        assert!(a.timeframe_days.is_none());
        assert!(a.calculated_end_date.is_none());
    }

    #[test]
    fn assessment_tolerates_partial_json() {
        let a: GoalAssessment =
            serde_json::from_str(r#"{"is_reasonable": true, "feedback": "ok"}"#).unwrap();
        assert!(a.is_reasonable);
        assert_eq!(a.feedback, "ok");
        assert!(a.daily_cal_kcal.is_none());
    }
}
