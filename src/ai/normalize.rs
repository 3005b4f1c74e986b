use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

const INSIGHT_MAX_CHARS: usize = 600;
const FALLBACK_INSIGHT_CHARS: usize = 240;
const NAME_MAX_CHARS: usize = 255;
const MAX_NUTRIENTS_PER_ITEM: usize = 10;
/// Relative tolerance before per-item macros get rescaled onto the totals.
const MACRO_TOLERANCE: f64 = 0.1;

/// Single nutrient line for a food item, e.g. ("Vitamin C", "25mg").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NutrientEntry {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FoodItemAnalysis {
    pub name: String,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
    pub cal_kcal: i32,
    pub nutrients: Vec<NutrientEntry>,
}

/// Validated, internally-consistent result of a meal-photo analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MealAnalysis {
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
    pub cal_kcal: i32,
    pub meal_score: i32,
    pub ai_insight: String,
    pub food_items: Vec<FoodItemAnalysis>,
}

/// Turn the raw model text into a [`MealAnalysis`].
///
/// Tries a direct parse, then the first balanced brace-delimited substring,
/// then falls back to a minimal record carrying the start of the raw text as
/// the insight. The fallback path cannot fail.
pub fn normalize_response(raw: &str) -> MealAnalysis {
    if let Ok(value) = serde_json::from_str::<Value>(raw) {
        if value.is_object() {
            return normalize_value(&value);
        }
    }

    if let Some(candidate) = extract_json_object(raw) {
        match serde_json::from_str::<Value>(candidate) {
            Ok(value) if value.is_object() => return normalize_value(&value),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "extracted JSON candidate failed to parse"),
        }
    }

    warn!(head = %truncate_chars(raw.trim(), 250), "AI response unusable, using fallback record");
    MealAnalysis {
        protein_g: 0.0,
        carbs_g: 0.0,
        fat_g: 0.0,
        cal_kcal: 0,
        meal_score: 5,
        ai_insight: truncate_chars(raw.trim(), FALLBACK_INSIGHT_CHARS),
        food_items: Vec::new(),
    }
}

/// First `{ ... }` span with balanced braces, skipping braces inside string
/// literals. Models like to wrap their JSON in markdown fences or prose.
fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in raw[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..start + i + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

fn normalize_value(data: &Value) -> MealAnalysis {
    let meal_score = match data.get("meal_score") {
        None | Some(Value::Null) => 5,
        Some(v) => inum(v),
    }
    .clamp(1, 10);

    let insight = data
        .get("ai_insight")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or("");
    let ai_insight = if insight.is_empty() {
        "No insight generated.".to_string()
    } else {
        truncate_chars(insight, INSIGHT_MAX_CHARS)
    };

    let mut result = MealAnalysis {
        protein_g: fnum(data.get("protein_g")),
        carbs_g: fnum(data.get("carbs_g")),
        fat_g: fnum(data.get("fat_g")),
        cal_kcal: inum_opt(data.get("cal_kcal")),
        meal_score,
        ai_insight,
        food_items: normalize_food_items(data.get("food_items")),
    };

    reconcile_totals(&mut result);
    result
}

fn normalize_food_items(value: Option<&Value>) -> Vec<FoodItemAnalysis> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let obj = item.as_object()?;

            let name = obj
                .get("name")
                .and_then(text)
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "Unknown Food".to_string());

            let nutrients = obj
                .get("nutrients")
                .and_then(Value::as_array)
                .map(|list| {
                    list.iter()
                        .take(MAX_NUTRIENTS_PER_ITEM)
                        .filter_map(|n| {
                            let n = n.as_object()?;
                            let name = text(n.get("name")?)?;
                            let value = text(n.get("value")?)?;
                            (!name.is_empty() && !value.is_empty())
                                .then_some(NutrientEntry { name, value })
                        })
                        .collect()
                })
                .unwrap_or_default();

            Some(FoodItemAnalysis {
                name: truncate_chars(&name, NAME_MAX_CHARS),
                protein_g: fnum(obj.get("protein_g")),
                carbs_g: fnum(obj.get("carbs_g")),
                fat_g: fnum(obj.get("fat_g")),
                cal_kcal: inum_opt(obj.get("cal_kcal")),
                nutrients,
            })
        })
        .collect()
}

/// Rescale per-item macros so their sums match the reported totals.
///
/// Per field: when the item-sum deviates from the total by more than the
/// relative tolerance (a zero total requires a zero sum), every item's value
/// for that field is multiplied by `total / sum`; a zero item-sum leaves the
/// factor at 1. Macros round to 1 decimal, calories to the nearest integer.
/// No items means nothing to reconcile.
fn reconcile_totals(result: &mut MealAnalysis) {
    if result.food_items.is_empty() {
        return;
    }

    let sum_protein: f64 = result.food_items.iter().map(|i| i.protein_g).sum();
    let sum_carbs: f64 = result.food_items.iter().map(|i| i.carbs_g).sum();
    let sum_fat: f64 = result.food_items.iter().map(|i| i.fat_g).sum();
    let sum_cal: f64 = result.food_items.iter().map(|i| f64::from(i.cal_kcal)).sum();

    let within = |sum: f64, total: f64| {
        if total == 0.0 {
            sum == 0.0
        } else {
            ((sum - total) / total).abs() <= MACRO_TOLERANCE
        }
    };

    if within(sum_protein, result.protein_g)
        && within(sum_carbs, result.carbs_g)
        && within(sum_fat, result.fat_g)
        && within(sum_cal, f64::from(result.cal_kcal))
    {
        return;
    }

    warn!("food item macros do not add up to totals, rescaling proportionally");

    let factor = |total: f64, sum: f64| if sum > 0.0 { total / sum } else { 1.0 };
    let protein_factor = factor(result.protein_g, sum_protein);
    let carbs_factor = factor(result.carbs_g, sum_carbs);
    let fat_factor = factor(result.fat_g, sum_fat);
    let cal_factor = factor(f64::from(result.cal_kcal), sum_cal);

    for item in &mut result.food_items {
        item.protein_g = round1(item.protein_g * protein_factor);
        item.carbs_g = round1(item.carbs_g * carbs_factor);
        item.fat_g = round1(item.fat_g * fat_factor);
        item.cal_kcal = (f64::from(item.cal_kcal) * cal_factor).round() as i32;
    }
}

/// Numeric coercion: accept a number or a numeric string, anything else is 0.
fn fnum(v: Option<&Value>) -> f64 {
    let parsed = match v {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|x| x.is_finite()).unwrap_or(0.0).max(0.0)
}

fn inum(v: &Value) -> i32 {
    fnum(Some(v)).round() as i32
}

fn inum_opt(v: Option<&Value>) -> i32 {
    fnum(v).round() as i32
}

fn text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(protein: f64, carbs: f64, fat: f64, cal: i32) -> Value {
        json!({
            "name": "Item",
            "protein_g": protein,
            "carbs_g": carbs,
            "fat_g": fat,
            "cal_kcal": cal,
            "nutrients": []
        })
    }

    #[test]
    fn direct_parse_happy_path() {
        let raw = json!({
            "protein_g": 32.5,
            "carbs_g": 40.0,
            "fat_g": 12.0,
            "cal_kcal": 410,
            "meal_score": 8,
            "ai_insight": "Balanced plate.",
            "food_items": [item(32.5, 40.0, 12.0, 410)]
        })
        .to_string();

        let result = normalize_response(&raw);
        assert_eq!(result.protein_g, 32.5);
        assert_eq!(result.cal_kcal, 410);
        assert_eq!(result.meal_score, 8);
        assert_eq!(result.ai_insight, "Balanced plate.");
        assert_eq!(result.food_items.len(), 1);
    }

    #[test]
    fn json_extracted_from_markdown_fence() {
        let raw = format!(
            "Here is the analysis:\n```json\n{}\n```\nHope that helps!",
            json!({"protein_g": 10, "carbs_g": 5, "fat_g": 2, "cal_kcal": 80, "meal_score": 6, "ai_insight": "ok", "food_items": []})
        );
        let result = normalize_response(&raw);
        assert_eq!(result.protein_g, 10.0);
        assert_eq!(result.meal_score, 6);
    }

    #[test]
    fn braces_inside_strings_do_not_break_extraction() {
        let raw = r#"note {"ai_insight": "use {butter} sparingly", "protein_g": 7} trailing"#;
        let result = normalize_response(raw);
        assert_eq!(result.protein_g, 7.0);
        assert_eq!(result.ai_insight, "use {butter} sparingly");
    }

    #[test]
    fn garbage_falls_back_to_minimal_record() {
        let raw = "The model refused to answer in JSON today. ".repeat(20);
        let result = normalize_response(&raw);
        assert_eq!(result.protein_g, 0.0);
        assert_eq!(result.carbs_g, 0.0);
        assert_eq!(result.fat_g, 0.0);
        assert_eq!(result.cal_kcal, 0);
        assert_eq!(result.meal_score, 5);
        assert!(result.food_items.is_empty());
        assert_eq!(result.ai_insight.chars().count(), 240);
        assert!(raw.starts_with(&result.ai_insight));
    }

    #[test]
    fn numeric_strings_coerce_and_junk_defaults_to_zero() {
        let raw = json!({
            "protein_g": "17.5",
            "carbs_g": {"oops": true},
            "fat_g": null,
            "cal_kcal": "200",
            "meal_score": "banana",
            "ai_insight": "   ",
            "food_items": []
        })
        .to_string();

        let result = normalize_response(&raw);
        assert_eq!(result.protein_g, 17.5);
        assert_eq!(result.carbs_g, 0.0);
        assert_eq!(result.fat_g, 0.0);
        assert_eq!(result.cal_kcal, 200);
        // junk score coerces to 0 and is clamped into range
        assert_eq!(result.meal_score, 1);
        assert_eq!(result.ai_insight, "No insight generated.");
    }

    #[test]
    fn missing_meal_score_defaults_to_five() {
        let raw = json!({"protein_g": 1, "carbs_g": 1, "fat_g": 1, "cal_kcal": 10, "ai_insight": "x", "food_items": []}).to_string();
        assert_eq!(normalize_response(&raw).meal_score, 5);
    }

    #[test]
    fn insight_is_capped_at_600_chars() {
        let long = "x".repeat(1000);
        let raw = json!({"ai_insight": long, "food_items": []}).to_string();
        assert_eq!(normalize_response(&raw).ai_insight.chars().count(), 600);
    }

    #[test]
    fn nutrients_capped_and_require_name_and_value() {
        let nutrients: Vec<Value> = (0..12)
            .map(|i| json!({"name": format!("N{i}"), "value": "1g"}))
            .chain([json!({"name": "missing value"}), json!({"value": "2g"})])
            .collect();
        let raw = json!({
            "protein_g": 0, "carbs_g": 0, "fat_g": 0, "cal_kcal": 0,
            "meal_score": 5, "ai_insight": "x",
            "food_items": [{"name": "Salad", "protein_g": 0, "carbs_g": 0, "fat_g": 0, "cal_kcal": 0, "nutrients": nutrients}]
        })
        .to_string();

        let result = normalize_response(&raw);
        assert_eq!(result.food_items[0].nutrients.len(), 10);
        assert!(result.food_items[0]
            .nutrients
            .iter()
            .all(|n| !n.name.is_empty() && !n.value.is_empty()));
    }

    #[test]
    fn item_name_defaults_and_is_trimmed() {
        let raw = json!({
            "food_items": [
                {"protein_g": 1},
                {"name": "  Greek Salad  ", "protein_g": 1}
            ],
            "protein_g": 2
        })
        .to_string();
        let result = normalize_response(&raw);
        assert_eq!(result.food_items[0].name, "Unknown Food");
        assert_eq!(result.food_items[1].name, "Greek Salad");
    }

    #[test]
    fn reconciliation_rescales_items_onto_totals() {
        // total protein 100, two items at 25 each -> 50 each
        let raw = json!({
            "protein_g": 100.0, "carbs_g": 0.0, "fat_g": 0.0, "cal_kcal": 0,
            "meal_score": 5, "ai_insight": "x",
            "food_items": [item(25.0, 0.0, 0.0, 0), item(25.0, 0.0, 0.0, 0)]
        })
        .to_string();

        let result = normalize_response(&raw);
        assert_eq!(result.food_items[0].protein_g, 50.0);
        assert_eq!(result.food_items[1].protein_g, 50.0);
        let sum: f64 = result.food_items.iter().map(|i| i.protein_g).sum();
        assert!((sum - 100.0).abs() < 0.05);
    }

    #[test]
    fn within_tolerance_leaves_items_untouched() {
        // items sum to 95 against a total of 100: inside the 10% band
        let raw = json!({
            "protein_g": 100.0, "carbs_g": 0.0, "fat_g": 0.0, "cal_kcal": 0,
            "meal_score": 5, "ai_insight": "x",
            "food_items": [item(45.0, 0.0, 0.0, 0), item(50.0, 0.0, 0.0, 0)]
        })
        .to_string();

        let result = normalize_response(&raw);
        assert_eq!(result.food_items[0].protein_g, 45.0);
        assert_eq!(result.food_items[1].protein_g, 50.0);
    }

    #[test]
    fn normalization_is_idempotent() {
        let raw = json!({
            "protein_g": 100.0, "carbs_g": 60.0, "fat_g": 20.0, "cal_kcal": 800,
            "meal_score": 7, "ai_insight": "x",
            "food_items": [item(25.0, 30.0, 10.0, 400), item(25.0, 30.0, 10.0, 400)]
        })
        .to_string();

        let first = normalize_response(&raw);
        let again = normalize_response(&serde_json::to_string(&first).unwrap());
        assert_eq!(first, again);
    }

    #[test]
    fn zero_item_sum_field_is_left_alone() {
        // fat total reported but items claim none; factor stays 1
        let raw = json!({
            "protein_g": 100.0, "carbs_g": 0.0, "fat_g": 30.0, "cal_kcal": 0,
            "meal_score": 5, "ai_insight": "x",
            "food_items": [item(25.0, 0.0, 0.0, 0), item(25.0, 0.0, 0.0, 0)]
        })
        .to_string();

        let result = normalize_response(&raw);
        assert_eq!(result.food_items[0].fat_g, 0.0);
        // protein was out of tolerance, so it still rescaled
        assert_eq!(result.food_items[0].protein_g, 50.0);
    }

    #[test]
    fn empty_item_list_skips_reconciliation() {
        let raw = json!({
            "protein_g": 100.0, "carbs_g": 50.0, "fat_g": 10.0, "cal_kcal": 700,
            "meal_score": 5, "ai_insight": "x", "food_items": []
        })
        .to_string();

        let result = normalize_response(&raw);
        assert_eq!(result.protein_g, 100.0);
        assert!(result.food_items.is_empty());
    }

    #[test]
    fn calories_rescale_to_whole_numbers() {
        let raw = json!({
            "protein_g": 0.0, "carbs_g": 0.0, "fat_g": 0.0, "cal_kcal": 1000,
            "meal_score": 5, "ai_insight": "x",
            "food_items": [item(0.0, 0.0, 0.0, 300), item(0.0, 0.0, 0.0, 300)]
        })
        .to_string();

        let result = normalize_response(&raw);
        assert_eq!(result.food_items[0].cal_kcal, 500);
        assert_eq!(result.food_items[1].cal_kcal, 500);
    }

    #[test]
    fn negative_macros_clamp_to_zero() {
        let raw = json!({"protein_g": -4.0, "carbs_g": 1.0, "fat_g": 0, "cal_kcal": -10, "meal_score": 5, "ai_insight": "x", "food_items": []}).to_string();
        let result = normalize_response(&raw);
        assert_eq!(result.protein_g, 0.0);
        assert_eq!(result.cal_kcal, 0);
    }

    #[test]
    fn bare_json_scalar_is_not_a_record() {
        let result = normalize_response("42");
        assert_eq!(result.meal_score, 5);
        assert_eq!(result.ai_insight, "42");
    }
}
