use std::collections::HashMap;

use anyhow::Context;
use time::macros::format_description;
use time::{Date, Duration, Month, Weekday};
use tracing::warn;

use super::dto::{DayCell, DayData, DayDetailsResponse, MonthInfo, MonthlyTrackingResponse};
use super::repo::UserDay;
use crate::goals::dto::DailyTargets;
use crate::goals::repo::UserGoal;
use crate::photos::dto::PhotoOut;
use crate::photos::repo::Photo;
use crate::state::AppState;

const PHOTO_URL_TTL_SECS: u64 = 30 * 60;

/// First and last calendar day of the month containing `date`, with the
/// December to January rollover handled.
pub fn month_bounds(date: Date) -> anyhow::Result<(Date, Date)> {
    let start = date.replace_day(1)?;
    let next_month_start = if date.month() == Month::December {
        Date::from_calendar_date(date.year() + 1, Month::January, 1)?
    } else {
        Date::from_calendar_date(date.year(), date.month().next(), 1)?
    };
    let end = next_month_start
        .previous_day()
        .context("month end underflow")?;
    Ok((start, end))
}

/// Human-readable natural key for a month, e.g. "July 2025".
pub fn month_title(date: Date) -> anyhow::Result<String> {
    Ok(date.format(format_description!("[month repr:long] [year]"))?)
}

pub fn month_name(date: Date) -> anyhow::Result<String> {
    Ok(date.format(format_description!("[month repr:long]"))?)
}

/// Monday-aligned window fully covering `first..=last`.
pub fn week_window(first: Date, last: Date) -> (Date, Date) {
    let to_monday = i64::from(first.weekday().number_days_from_monday());
    let to_sunday = i64::from(6 - last.weekday().number_days_from_monday());
    (
        first - Duration::days(to_monday),
        last + Duration::days(to_sunday),
    )
}

/// Lay the window out as weeks of seven cells, marking which cells belong
/// to the requested month and filling tracked days with their totals.
pub fn build_weeks(
    first: Date,
    last: Date,
    week_start: Date,
    week_end: Date,
    days_by_date: &HashMap<Date, UserDay>,
) -> anyhow::Result<Vec<Vec<DayCell>>> {
    let mut weeks: Vec<Vec<DayCell>> = Vec::new();
    let mut current = week_start;

    while current <= week_end {
        if current.weekday() == Weekday::Monday || weeks.is_empty() {
            weeks.push(Vec::new());
        }

        let is_current_month = first <= current && current <= last;
        let cell = match days_by_date.get(&current) {
            Some(day) => DayCell {
                date: current.to_string(),
                day_of_month: current.day(),
                is_current_month,
                calories: Some(day.tot_cal_kcal),
                protein: Some(day.tot_protein_g),
                carbs: Some(day.tot_carbs_g),
                fat: Some(day.tot_fat_g),
                meal_score: Some(day.meal_score_avg),
                has_data: true,
            },
            None => DayCell {
                date: current.to_string(),
                day_of_month: current.day(),
                is_current_month,
                calories: None,
                protein: None,
                carbs: None,
                fat: None,
                meal_score: None,
                has_data: false,
            },
        };

        if let Some(week) = weeks.last_mut() {
            week.push(cell);
        }
        current = current.next_day().context("date overflow")?;
    }

    Ok(weeks)
}

/// Calendar grid for one month plus the active goal's daily targets.
pub async fn monthly_tracking(
    state: &AppState,
    user_id: uuid::Uuid,
    year: i32,
    month: Month,
) -> anyhow::Result<MonthlyTrackingResponse> {
    let target = Date::from_calendar_date(year, month, 1)?;
    let (first, last) = month_bounds(target)?;
    let (week_start, week_end) = week_window(first, last);

    let days = UserDay::list_in_range(&state.db, user_id, week_start, week_end).await?;
    let days_by_date: HashMap<Date, UserDay> =
        days.into_iter().map(|d| (d.day_date, d)).collect();
    let weeks = build_weeks(first, last, week_start, week_end, &days_by_date)?;

    let goal_data = UserGoal::find_active(&state.db, user_id)
        .await?
        .as_ref()
        .map(DailyTargets::from);

    let prev_last = first.previous_day().context("month start underflow")?;
    let (prev_first, _) = month_bounds(prev_last)?;
    let has_prev_month =
        UserDay::exists_in_range(&state.db, user_id, prev_first, prev_last).await?;

    let next_first = last.next_day().context("month end overflow")?;
    let (_, next_last) = month_bounds(next_first)?;
    let has_next_month =
        UserDay::exists_in_range(&state.db, user_id, next_first, next_last).await?;

    Ok(MonthlyTrackingResponse {
        month_info: MonthInfo {
            year,
            month: u8::from(month),
            month_name: month_name(target)?,
            month_year: month_title(target)?,
        },
        weeks,
        goal_data,
        has_prev_month,
        has_next_month,
    })
}

/// Day aggregate plus the photos taken on that date and the active goal's
/// daily targets. The day row may not exist yet; photos are matched by
/// their capture date, not the day link.
pub async fn day_details(
    state: &AppState,
    user_id: uuid::Uuid,
    date: Date,
) -> anyhow::Result<DayDetailsResponse> {
    let day = UserDay::find_by_date(&state.db, user_id, date).await?;
    let photos = Photo::list_for_date(&state.db, user_id, date).await?;

    let mut photos_data = Vec::with_capacity(photos.len());
    for photo in &photos {
        let image_url = match state
            .storage
            .presign_get(&photo.object_key, PHOTO_URL_TTL_SECS)
            .await
        {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(error = %e, key = %photo.object_key, "presign failed");
                None
            }
        };
        photos_data.push(PhotoOut::from_photo(photo, image_url));
    }

    let goal_data = UserGoal::find_active(&state.db, user_id)
        .await?
        .as_ref()
        .map(DailyTargets::from);

    Ok(DayDetailsResponse {
        day_data: day.map(|d| DayData {
            id: d.id,
            date: d.day_date.to_string(),
            tot_cal_kcal: d.tot_cal_kcal,
            tot_protein_g: d.tot_protein_g,
            tot_carbs_g: d.tot_carbs_g,
            tot_fat_g: d.tot_fat_g,
            meal_score_avg: d.meal_score_avg,
        }),
        photos: photos_data,
        goal_data,
        date: date.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn month_bounds_mid_year() {
        let (start, end) = month_bounds(date!(2025 - 07 - 19)).unwrap();
        assert_eq!(start, date!(2025 - 07 - 01));
        assert_eq!(end, date!(2025 - 07 - 31));
    }

    #[test]
    fn month_bounds_february_leap() {
        let (_, end) = month_bounds(date!(2024 - 02 - 10)).unwrap();
        assert_eq!(end, date!(2024 - 02 - 29));
    }

    #[test]
    fn month_bounds_december_rolls_into_next_year() {
        let (start, end) = month_bounds(date!(2025 - 12 - 05)).unwrap();
        assert_eq!(start, date!(2025 - 12 - 01));
        assert_eq!(end, date!(2025 - 12 - 31));
    }

    #[test]
    fn month_title_is_human_readable() {
        assert_eq!(month_title(date!(2025 - 07 - 19)).unwrap(), "July 2025");
        assert_eq!(month_title(date!(2025 - 01 - 01)).unwrap(), "January 2025");
    }

    #[test]
    fn week_window_aligns_monday_to_sunday() {
        // July 2025: the 1st is a Tuesday, the 31st a Thursday
        let (start, end) = week_window(date!(2025 - 07 - 01), date!(2025 - 07 - 31));
        assert_eq!(start, date!(2025 - 06 - 30));
        assert_eq!(start.weekday(), Weekday::Monday);
        assert_eq!(end, date!(2025 - 08 - 03));
        assert_eq!(end.weekday(), Weekday::Sunday);
    }

    #[test]
    fn build_weeks_produces_full_weeks() {
        let first = date!(2025 - 07 - 01);
        let last = date!(2025 - 07 - 31);
        let (ws, we) = week_window(first, last);
        let weeks = build_weeks(first, last, ws, we, &HashMap::new()).unwrap();

        assert_eq!(weeks.len(), 5);
        assert!(weeks.iter().all(|w| w.len() == 7));

        // padding day from June
        let padding = &weeks[0][0];
        assert!(!padding.is_current_month);
        assert!(!padding.has_data);
        assert_eq!(padding.day_of_month, 30);

        let july_first = &weeks[0][1];
        assert!(july_first.is_current_month);
        assert_eq!(july_first.date, "2025-07-01");
    }
}
