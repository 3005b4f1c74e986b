use std::fmt::Write as _;

use crate::goals::repo::UserGoal;
use crate::users::repo::UserProfile;

/// Instruction sent alongside the meal image.
pub const MEAL_USER_INSTRUCTION: &str = "Analyze this meal image, providing total macros and \
breaking down individual food items with their proportional macros and nutrients.";

/// System prompt for the vision call. Requests the fixed JSON schema the
/// normalizer expects and, when available, weaves in the caller's profile
/// and active goal so the insight and score are personalized.
pub fn meal_system_prompt(profile: Option<&UserProfile>, goal: Option<&UserGoal>) -> String {
    let mut prompt = String::from(
        "You are a personalized nutrition coach. Return ONLY valid JSON (no markdown, no commentary).\n\
         If information is uncertain, estimate reasonable typical values.\n",
    );

    if let Some(p) = profile {
        let _ = write!(
            prompt,
            "\nUser profile:\n  Age: {}\n  Weight: {} kg\n  Height: {} cm\n  Gender: {}\n  Activity level: {}\n",
            opt(p.age),
            opt(p.weight_kg),
            opt(p.height_cm),
            opt(p.gender.clone()),
            opt(p.activity_level.clone()),
        );
    }

    prompt.push_str(
        "\nRequired JSON structure:\n\
         {\n\
           \"protein_g\": float,\n\
           \"carbs_g\": float,\n\
           \"fat_g\": float,\n\
           \"cal_kcal\": integer,\n\
           \"meal_score\": integer,  // 1-10, based on general health if no goal is given\n\
           \"ai_insight\": string,\n\
           \"food_items\": [\n\
             {\n\
               \"name\": string,\n\
               \"protein_g\": float,\n\
               \"carbs_g\": float,\n\
               \"fat_g\": float,\n\
               \"cal_kcal\": integer,\n\
               \"nutrients\": [{\"name\": string, \"value\": string}]  // up to 10 most important nutrients\n\
             }\n\
           ]\n\
         }\n\
         \n\
         CRITICAL:\n\
         1. Identify individual food items in the image (up to 10 most significant items)\n\
         2. The sum of all individual food items' macros MUST equal the total meal macros\n\
         3. Distribute macros proportionally based on estimated portion sizes\n\
         4. Be specific with food item names (e.g. \"French Fries\" not just \"Potatoes\")\n",
    );

    if let Some(g) = goal {
        let objective = g.objective.as_deref().unwrap_or("");
        let _ = write!(
            prompt,
            "\nUser goal type: {}\nUser objective: {}\n\
             Format your ai_insight EXACTLY like this:\n\
             [User Goal: {}] [Objective: {}]\n\
             Analysis: [your specific analysis of the meal]\n\
             Recommendation: [your specific recommendations based on their goal]\n\
             Alignment: [explain why you gave this meal_score and how it aligns with their goals]\n\
             Give meal_score 1-10 reflecting alignment with the goal type and objective above.\n",
            g.goal_type.label().to_lowercase(),
            objective,
            g.goal_type.label().to_lowercase(),
            objective,
        );
    }

    prompt.push_str("\nRespond with JSON only.\n");
    prompt
}

/// System prompt for the goal-validation call. The model judges feasibility
/// against the caller's biometrics and derives daily macro targets from TDEE.
pub const GOAL_VALIDATION_SYSTEM: &str = "\
You are a personalized health and fitness expert. Analyze the user's fitness goal for realism, \
safety, and achievability based on their biometric profile and the timeframe in their objective.

Calculate personalized daily macro recommendations and caloric intake:
1. Calculate their TDEE (Total Daily Energy Expenditure) from their biometrics and activity level
2. Adjust calories for their goal (deficit for weight loss, surplus for muscle building)
3. Derive optimal protein, carbs, and fat grams and percentages for that goal

Return a JSON object with values in the following types:
{
    \"is_reasonable\": true/false,
    \"feedback\": \"Personalized explanation referencing their age, weight, height, gender, and activity level.\",
    \"suggestion\": \"If unreasonable, a personalized alternative that fits their biometrics.\",
    \"extracted_timeframe\": \"The timeframe found in the objective (e.g. '2 weeks', '3 months')\",
    \"timeframe_days\": 30,
    \"daily_cal_kcal\": 2200,
    \"daily_protein_g\": 165.0,
    \"daily_fat_g\": 73.0,
    \"daily_carbs_g\": 220.0,
    \"protein_perc\": 0.30,
    \"carbs_perc\": 0.40,
    \"fat_perc\": 0.30
}

Macro guidelines:
- Muscle building: 1.6-2.2 g/kg protein, 40-50% carbs, 25-35% fat
- Weight loss: 1.6-2.4 g/kg protein to preserve muscle, 30-40% carbs, 25-35% fat
- General health: 1.2-1.6 g/kg protein, 45-55% carbs, 25-35% fat
- Ensure percentages add up to 1.0

BMR via Mifflin-St Jeor (men: 10w + 6.25h - 5a + 5; women: 10w + 6.25h - 5a - 161), \
scaled by activity multiplier (sedentary 1.2 up to very high 1.9).

Be encouraging but scientifically accurate, and always reference their specific data points.";

pub fn goal_validation_user_prompt(
    profile: &UserProfile,
    goal_type_label: &str,
    objective: &str,
) -> String {
    format!(
        "User biometrics: Age: {}, Weight: {} kg, Height: {} cm, Gender: {}\n\
         Activity level: {}\n\
         Goal type: {}\n\
         User objective: {}\n\n\
         Please extract the timeframe from the user's objective and analyze if this goal is \
         reasonable and safe. If no specific timeframe is mentioned, assume a reasonable \
         timeframe based on the goal type.",
        opt(profile.age),
        opt(profile.weight_kg),
        opt(profile.height_cm),
        opt(profile.gender.clone()),
        opt(profile.activity_level.clone()),
        goal_type_label,
        objective,
    )
}

fn opt<T: std::fmt::Display>(v: Option<T>) -> String {
    v.map_or_else(|| "unknown".to_string(), |x| x.to_string())
}
