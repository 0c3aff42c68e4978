//! Due-date arithmetic for habit periods.
//!
//! The n-th due date of a habit is always computed from its start date
//! (`start + n * frequency` periods), so monthly habits started on the 31st
//! clamp in short months without drifting to an earlier day afterwards.

use crate::models::{GoalDuration, GoalUnit, Habit, Period};
use chrono::{DateTime, Duration, Months, Utc};

pub fn next_due_date(period: Period, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
    advance(period, from, 1)
}

pub fn advance(period: Period, from: DateTime<Utc>, steps: u32) -> Option<DateTime<Utc>> {
    match period {
        Period::Daily => from.checked_add_signed(Duration::days(i64::from(steps))),
        Period::Weekly => from.checked_add_signed(Duration::weeks(i64::from(steps))),
        Period::Monthly => from.checked_add_months(Months::new(steps)),
    }
}

pub fn goal_end(goal: GoalDuration, start: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let amount = goal.amount;
    match goal.unit {
        GoalUnit::Day => start.checked_add_signed(Duration::days(i64::from(amount))),
        GoalUnit::Week => start.checked_add_signed(Duration::weeks(i64::from(amount))),
        GoalUnit::Month => start.checked_add_months(Months::new(amount)),
        GoalUnit::Year => start.checked_add_months(Months::new(amount.checked_mul(12)?)),
    }
}

/// One scheduled occurrence: the task window opens at `start_date` and closes at `due_date`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub task_number: u32,
    pub start_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
}

/// Lazy, finite sequence of a habit's slots up to a horizon (never past the goal end).
#[derive(Debug, Clone)]
pub struct Schedule {
    start: DateTime<Utc>,
    period: Period,
    frequency: u32,
    until: DateTime<Utc>,
    next_number: u32,
}

impl Schedule {
    pub fn for_habit(habit: &Habit, horizon: DateTime<Utc>) -> Self {
        let until = match goal_end(habit.goal, habit.start_date) {
            Some(end) => end.min(horizon),
            None => horizon,
        };
        Self {
            start: habit.start_date,
            period: habit.period,
            frequency: habit.frequency.max(1),
            until,
            next_number: 1,
        }
    }

    /// Skips every slot up to and including `task_number`.
    pub fn resume_after(mut self, task_number: u32) -> Self {
        self.next_number = task_number.saturating_add(1);
        self
    }

    fn due(&self, number: u32) -> Option<DateTime<Utc>> {
        advance(self.period, self.start, number.checked_mul(self.frequency)?)
    }
}

impl Iterator for Schedule {
    type Item = Slot;

    fn next(&mut self) -> Option<Slot> {
        let number = self.next_number;
        let due_date = self.due(number)?;
        if due_date > self.until {
            return None;
        }
        let start_date = self.due(number - 1)?;
        self.next_number = number.checked_add(1)?;
        Some(Slot {
            task_number: number,
            start_date,
            due_date,
        })
    }
}

pub fn schedule_up_to(habit: &Habit, horizon: DateTime<Utc>) -> Schedule {
    Schedule::for_habit(habit, horizon)
}

/// Number of tasks the habit needs over its whole goal.
pub fn planned_task_count(habit: &Habit) -> u32 {
    match goal_end(habit.goal, habit.start_date) {
        Some(end) => Schedule::for_habit(habit, end).count() as u32,
        None => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        let date = NaiveDate::from_ymd_opt(y, m, d).unwrap();
        Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap())
    }

    fn habit(period: Period, frequency: u32, goal: &str, start: DateTime<Utc>) -> Habit {
        Habit {
            id: 1,
            name: "reading".to_string(),
            frequency,
            period,
            goal: goal.parse().unwrap(),
            start_date: start,
            notes: String::new(),
            creation_time: start,
        }
    }

    #[test]
    fn next_due_date_per_period() {
        let from = at(2024, 1, 31);
        assert_eq!(next_due_date(Period::Daily, from), Some(at(2024, 2, 1)));
        assert_eq!(next_due_date(Period::Weekly, from), Some(at(2024, 2, 7)));
        assert_eq!(next_due_date(Period::Monthly, from), Some(at(2024, 2, 29)));
    }

    #[test]
    fn monthly_schedule_clamps_without_drift() {
        let h = habit(Period::Monthly, 1, "3 months", at(2024, 1, 31));
        let dues: Vec<_> = schedule_up_to(&h, at(2030, 1, 1)).map(|s| s.due_date).collect();
        assert_eq!(dues, vec![at(2024, 2, 29), at(2024, 3, 31), at(2024, 4, 30)]);
    }

    #[test]
    fn schedule_is_bounded_by_goal_and_chains_windows() {
        let h = habit(Period::Daily, 1, "1 week", at(2024, 1, 1));
        let slots: Vec<_> = schedule_up_to(&h, at(2030, 1, 1)).collect();
        assert_eq!(slots.len(), 7);
        assert_eq!(slots[0].start_date, at(2024, 1, 1));
        assert_eq!(slots[0].due_date, at(2024, 1, 2));
        for pair in slots.windows(2) {
            assert_eq!(pair[0].due_date, pair[1].start_date);
            assert_eq!(pair[0].task_number + 1, pair[1].task_number);
        }
        assert_eq!(planned_task_count(&h), 7);
    }

    #[test]
    fn frequency_stretches_each_window() {
        let h = habit(Period::Daily, 2, "1 week", at(2024, 1, 1));
        let dues: Vec<_> = schedule_up_to(&h, at(2030, 1, 1)).map(|s| s.due_date).collect();
        assert_eq!(dues, vec![at(2024, 1, 3), at(2024, 1, 5), at(2024, 1, 7)]);
    }

    #[test]
    fn horizon_limits_and_schedule_restarts() {
        let h = habit(Period::Weekly, 1, "1 year", at(2024, 1, 1));
        let schedule = schedule_up_to(&h, at(2024, 1, 22));
        assert_eq!(schedule.clone().count(), 3);
        assert_eq!(schedule.clone().count(), 3);

        let rest: Vec<_> = schedule.resume_after(2).collect();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].task_number, 3);
        assert_eq!(rest[0].due_date, at(2024, 1, 22));
    }

    #[test]
    fn unachievable_goal_plans_nothing() {
        let h = habit(Period::Monthly, 1, "3 days", at(2024, 1, 1));
        assert_eq!(planned_task_count(&h), 0);
    }
}
