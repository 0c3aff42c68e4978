use crate::errors::TrackerError;
use crate::ledger::{HabitRecord, Tracker};
use crate::models::{
    ActivityResponse, AnalysisResponse, DailyPoint, HabitId, HabitSummary, Period, Streak,
    StruggledHabit, TaskStatus, WeeklyPoint,
};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use std::{cmp::Ordering, collections::BTreeMap};

pub const DEFAULT_WINDOW_DAYS: i64 = 30;

pub fn habits_by_period(
    tracker: &Tracker,
    period: Option<Period>,
    now: DateTime<Utc>,
) -> Vec<HabitSummary> {
    tracker
        .habits()
        .filter(|record| period.is_none_or(|period| record.habit.period == period))
        .map(|record| record.summary(now))
        .collect()
}

pub fn completed_habits(tracker: &Tracker, now: DateTime<Utc>) -> Vec<HabitSummary> {
    tracker
        .habits()
        .filter(|record| record.completion_date().is_some())
        .map(|record| record.summary(now))
        .collect()
}

pub fn longest_streak_overall(tracker: &Tracker) -> Option<&HabitRecord> {
    best_by(tracker, |streak| streak.longest_streak)
}

pub fn longest_current_streak_overall(tracker: &Tracker) -> Option<&HabitRecord> {
    best_by(tracker, |streak| streak.current_streak)
}

/// Highest value wins; ties go to the earliest start date, then the lowest id.
fn best_by(tracker: &Tracker, key: impl Fn(&Streak) -> u32) -> Option<&HabitRecord> {
    tracker.habits().min_by(|a, b| {
        key(&b.streak)
            .cmp(&key(&a.streak))
            .then(a.habit.start_date.cmp(&b.habit.start_date))
            .then(a.habit.id.cmp(&b.habit.id))
    })
}

pub fn failed_in_window(record: &HabitRecord, window: Duration, now: DateTime<Utc>) -> u32 {
    let since = now - window;
    record
        .tasks
        .iter()
        .filter(|task| {
            task.status == TaskStatus::Failed && task.due_date >= since && task.due_date <= now
        })
        .count() as u32
}

/// The habit of `period` that failed most in the trailing window.
///
/// Ties go to the lower longest streak, then the smaller name. `None` when nothing failed.
pub fn most_struggled(
    tracker: &Tracker,
    period: Period,
    window: Duration,
    now: DateTime<Utc>,
) -> Option<StruggledHabit> {
    let (record, failed) = tracker
        .habits()
        .filter(|record| record.habit.period == period)
        .map(|record| (record, failed_in_window(record, window, now)))
        .filter(|(_, failed)| *failed > 0)
        .min_by(|(a, a_failed), (b, b_failed)| compare_struggle(a, *a_failed, b, *b_failed))?;

    Some(StruggledHabit {
        period,
        failed_in_window: failed,
        habit: record.summary(now),
    })
}

fn compare_struggle(a: &HabitRecord, a_failed: u32, b: &HabitRecord, b_failed: u32) -> Ordering {
    b_failed
        .cmp(&a_failed)
        .then(a.streak.longest_streak.cmp(&b.streak.longest_streak))
        .then(a.habit.name.cmp(&b.habit.name))
}

pub fn habit_analysis(
    tracker: &Tracker,
    habit_id: HabitId,
    now: DateTime<Utc>,
) -> Result<HabitSummary, TrackerError> {
    Ok(tracker.habit(habit_id)?.summary(now))
}

pub fn build_analysis_at(now: DateTime<Utc>, tracker: &Tracker, window: Duration) -> AnalysisResponse {
    AnalysisResponse {
        all_habits: habits_by_period(tracker, None, now),
        daily_habits: habits_by_period(tracker, Some(Period::Daily), now),
        weekly_habits: habits_by_period(tracker, Some(Period::Weekly), now),
        monthly_habits: habits_by_period(tracker, Some(Period::Monthly), now),
        completed_habits: completed_habits(tracker, now),
        longest_streak_habit: longest_streak_overall(tracker).map(|record| record.summary(now)),
        longest_current_streak_habit: longest_current_streak_overall(tracker)
            .map(|record| record.summary(now)),
        most_struggled: Period::ALL
            .into_iter()
            .filter_map(|period| most_struggled(tracker, period, window, now))
            .collect(),
        window_days: window.num_days(),
        activity: build_activity_at(now.date_naive(), tracker),
    }
}

/// Completed and failed task counts for the last 7 days and the last 8 ISO weeks.
pub fn build_activity_at(today: NaiveDate, tracker: &Tracker) -> ActivityResponse {
    const WEEK_COUNT: usize = 8;

    let mut days: BTreeMap<NaiveDate, (u32, u32)> = BTreeMap::new();
    for task in tracker.habits().flat_map(|record| record.tasks.iter()) {
        match task.status {
            TaskStatus::Completed => {
                if let Some(done) = task.completion_date {
                    days.entry(done.date_naive()).or_default().0 += 1;
                }
            }
            TaskStatus::Failed => days.entry(task.due_date.date_naive()).or_default().1 += 1,
            TaskStatus::Pending => {}
        }
    }
    let counts = |date: NaiveDate| days.get(&date).copied().unwrap_or_default();

    let mut last_7_days = Vec::with_capacity(7);
    for offset in (0..7).rev() {
        let date = today - Duration::days(offset);
        let (completed, failed) = counts(date);
        last_7_days.push(DailyPoint {
            date: date.to_string(),
            completed,
            failed,
        });
    }

    let this_monday = today.week(Weekday::Mon).first_day();
    let mut weekly_totals = Vec::with_capacity(WEEK_COUNT);
    for offset in (0..WEEK_COUNT).rev() {
        let start = this_monday - Duration::weeks(offset as i64);
        let iso = start.iso_week();
        let end = start + Duration::days(6);

        let (mut completed, mut failed) = (0u32, 0u32);
        for day_offset in 0..7 {
            let (day_completed, day_failed) = counts(start + Duration::days(day_offset));
            completed = completed.saturating_add(day_completed);
            failed = failed.saturating_add(day_failed);
        }

        weekly_totals.push(WeeklyPoint {
            week: format!("{}-W{:02}", iso.year(), iso.week()),
            start_date: start.to_string(),
            end_date: end.to_string(),
            completed,
            failed,
        });
    }

    ActivityResponse {
        last_7_days,
        weekly_totals,
    }
}
