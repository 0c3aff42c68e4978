//! Task ledger: habits, their scheduled tasks and the transitions between task states.
//!
//! Every transition for a habit is applied in due-date order. Completing a task
//! first fails any earlier task of the same habit that is still pending, and the
//! sweep walks each habit's tasks from oldest to newest. The streak is updated
//! incrementally and checked against a full re-derivation after every change.

use crate::achievements::record_if_milestone;
use crate::errors::{FieldErrors, TrackerError};
use crate::models::{
    Achievement, GoalDuration, Habit, HabitId, HabitRef, HabitSummary, NewHabitRequest, Period, Streak,
    SweepReport, Task, TaskId, TaskStatus, TaskView,
};
use crate::schedule::{goal_end, planned_task_count, Schedule};
use crate::streak::StreakChange;
use chrono::{DateTime, Duration, Months, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, str::FromStr};
use tracing::debug;

/// Longest goal a habit may set; bounds the number of tasks a schedule can plan.
pub const MAX_GOAL_YEARS: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionPolicy {
    /// A pending task can be completed until the sweep fails it.
    UntilSweep,
    /// Completion is refused once `due_date + grace` has passed.
    Grace(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerPolicy {
    pub completion: CompletionPolicy,
    /// How far past `now` tasks are materialized.
    pub lookahead: Duration,
}

impl Default for LedgerPolicy {
    fn default() -> Self {
        Self {
            completion: CompletionPolicy::UntilSweep,
            lookahead: Duration::days(31),
        }
    }
}

impl LedgerPolicy {
    fn grace(&self) -> Duration {
        match self.completion {
            CompletionPolicy::UntilSweep => Duration::zero(),
            CompletionPolicy::Grace(grace) => grace,
        }
    }

    /// Last instant at which the task may still be completed; `None` means never closes.
    fn deadline(&self, task: &Task) -> Option<DateTime<Utc>> {
        task.due_date.checked_add_signed(self.grace())
    }

    fn is_overdue(&self, task: &Task, now: DateTime<Utc>) -> bool {
        self.deadline(task).is_some_and(|deadline| deadline < now)
    }

    /// Under a grace policy an earlier pending task stays completable until its grace runs out.
    fn holds_back(&self, earlier: &Task, at: DateTime<Utc>) -> bool {
        matches!(self.completion, CompletionPolicy::Grace(_))
            && earlier.is_pending()
            && !self.is_overdue(earlier, at)
    }

    fn horizon(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_add_signed(self.lookahead).unwrap_or(now)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    DueToday,
    Active,
    Upcoming,
}

impl FromStr for TaskKind {
    type Err = TrackerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "due_today" => Ok(TaskKind::DueToday),
            "active" => Ok(TaskKind::Active),
            "upcoming" => Ok(TaskKind::Upcoming),
            other => Err(TrackerError::field(
                "type",
                format!("unknown task type '{other}': expected due_today, active or upcoming"),
            )),
        }
    }
}

/// A habit together with everything it owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HabitRecord {
    pub habit: Habit,
    pub tasks: Vec<Task>,
    pub streak: Streak,
    pub achievements: Vec<Achievement>,
}

impl HabitRecord {
    pub fn goal_end(&self) -> Option<DateTime<Utc>> {
        goal_end(self.habit.goal, self.habit.start_date)
    }

    pub fn num_of_tasks(&self) -> u32 {
        planned_task_count(&self.habit)
    }

    /// Materialization reaches `policy.horizon(now)` and at least the task whose window holds `now`.
    fn horizon(&self, now: DateTime<Utc>, policy: &LedgerPolicy) -> DateTime<Utc> {
        let horizon = policy.horizon(now);
        if self.tasks.last().is_some_and(|task| task.due_date > now) {
            return horizon;
        }
        let Some(end) = self.goal_end() else {
            return horizon;
        };
        let last_number = self.tasks.last().map_or(0, |task| task.task_number);
        Schedule::for_habit(&self.habit, end)
            .resume_after(last_number)
            .find(|slot| slot.due_date > now)
            .map_or(horizon, |slot| slot.due_date.max(horizon))
    }

    pub fn in_progress(&self, now: DateTime<Utc>) -> u32 {
        self.tasks
            .iter()
            .filter(|task| task.is_pending() && task.start_date <= now)
            .count() as u32
    }

    /// Completed share of the planned tasks, as a whole percentage.
    pub fn progress(&self) -> u8 {
        self.progress_of(self.num_of_tasks())
    }

    fn progress_of(&self, planned: u32) -> u8 {
        if planned == 0 {
            return 0;
        }
        let done = u64::from(self.streak.num_of_completed_tasks.min(planned));
        (done * 100 / u64::from(planned)) as u8
    }

    /// Set once every task through the goal exists and has been resolved.
    pub fn completion_date(&self) -> Option<DateTime<Utc>> {
        self.completion_date_of(self.num_of_tasks())
    }

    fn completion_date_of(&self, planned: u32) -> Option<DateTime<Utc>> {
        let planned = planned as usize;
        if planned == 0 || self.tasks.len() < planned {
            return None;
        }
        let mut latest: Option<DateTime<Utc>> = None;
        for task in &self.tasks {
            let resolved = task.resolved_at()?;
            latest = Some(latest.map_or(resolved, |current| current.max(resolved)));
        }
        latest
    }

    pub fn summary(&self, now: DateTime<Utc>) -> HabitSummary {
        let planned = self.num_of_tasks();
        HabitSummary {
            id: self.habit.id,
            name: self.habit.name.clone(),
            period: self.habit.period,
            frequency: self.habit.frequency,
            goal: self.habit.goal,
            notes: self.habit.notes.clone(),
            num_of_tasks: planned,
            in_progress: self.in_progress(now),
            progress: self.progress_of(planned),
            streak: self.streak.clone(),
            creation_time: self.habit.creation_time,
            start_date: self.habit.start_date,
            goal_end_date: self.goal_end(),
            completion_date: self.completion_date_of(planned),
        }
    }

    pub fn habit_ref(&self) -> HabitRef {
        HabitRef {
            id: self.habit.id,
            name: self.habit.name.clone(),
            period: self.habit.period,
            notes: self.habit.notes.clone(),
        }
    }

    fn fail_task(&mut self, index: usize) {
        let task = &mut self.tasks[index];
        task.status = TaskStatus::Failed;
        debug!(habit_id = task.habit_id, task_id = task.id, "task failed");
        self.streak.on_failed();
    }
}

/// Outcome of a successful completion.
#[derive(Debug, Clone)]
pub struct Completion {
    pub task: Task,
    pub streak: Streak,
    pub achievement: Option<Achievement>,
    /// Earlier pending tasks of the same habit that were failed first.
    pub expired_earlier: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tracker {
    next_habit_id: HabitId,
    next_task_id: TaskId,
    next_achievement_id: u64,
    habits: BTreeMap<HabitId, HabitRecord>,
}

impl Tracker {
    pub fn len(&self) -> usize {
        self.habits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.habits.is_empty()
    }

    pub fn habits(&self) -> impl Iterator<Item = &HabitRecord> {
        self.habits.values()
    }

    pub fn habit(&self, habit_id: HabitId) -> Result<&HabitRecord, TrackerError> {
        self.habits
            .get(&habit_id)
            .ok_or_else(|| TrackerError::habit_not_found(habit_id))
    }

    pub fn task(&self, task_id: TaskId) -> Option<&Task> {
        self.habits
            .values()
            .flat_map(|record| record.tasks.iter())
            .find(|task| task.id == task_id)
    }

    /// Validates the request, stores the habit and materializes its first tasks.
    pub fn create_habit(
        &mut self,
        request: &NewHabitRequest,
        now: DateTime<Utc>,
        policy: &LedgerPolicy,
    ) -> Result<HabitId, TrackerError> {
        let mut habit = self.validate_new_habit(request, now)?;
        self.next_habit_id += 1;
        let habit_id = self.next_habit_id;
        habit.id = habit_id;

        self.habits.insert(
            habit_id,
            HabitRecord {
                streak: Streak::new(habit_id),
                habit,
                tasks: Vec::new(),
                achievements: Vec::new(),
            },
        );
        let horizon = self.habit(habit_id)?.horizon(now, policy);
        let created = self.materialize(habit_id, horizon)?;
        debug!(habit_id, created, "habit scheduled");
        Ok(habit_id)
    }

    fn validate_new_habit(
        &self,
        request: &NewHabitRequest,
        now: DateTime<Utc>,
    ) -> Result<Habit, TrackerError> {
        let period: Period = request.period.parse()?;
        let mut errors = FieldErrors::new();

        let name = request.name.trim().to_string();
        if name.is_empty() {
            reject(&mut errors, "name", "Name is required".to_string());
        } else if self
            .habits
            .values()
            .any(|record| record.habit.name.trim().eq_ignore_ascii_case(&name))
        {
            reject(
                &mut errors,
                "name",
                "You already used that name for another habit".to_string(),
            );
        }

        let frequency = match request.frequency.map(u32::try_from) {
            Some(Ok(value)) if value >= 1 => value,
            _ => {
                reject(&mut errors, "frequency", "Frequency must be at least 1".to_string());
                1
            }
        };

        let goal = if request.goal.trim().is_empty() {
            reject(&mut errors, "goal", "Goal is required".to_string());
            None
        } else {
            match request.goal.parse::<GoalDuration>() {
                Ok(goal) => Some(goal),
                Err(message) => {
                    reject(&mut errors, "goal", message);
                    None
                }
            }
        };

        let start_date = if request.start_date.trim().is_empty() {
            reject(&mut errors, "start_date", "Start date is required".to_string());
            None
        } else {
            let parsed = parse_start_date(&request.start_date);
            if parsed.is_none() {
                reject(
                    &mut errors,
                    "start_date",
                    format!("Start date '{}' is not a valid date", request.start_date),
                );
            }
            parsed
        };

        let (Some(goal), Some(start_date)) = (goal, start_date) else {
            return Err(TrackerError::Validation(errors));
        };
        let habit = Habit {
            id: 0,
            name,
            frequency,
            period,
            goal,
            start_date,
            notes: request.notes.as_deref().unwrap_or_default().trim().to_string(),
            creation_time: now,
        };
        let longest = habit
            .start_date
            .checked_add_months(Months::new(MAX_GOAL_YEARS * 12));
        let fits = match (goal_end(habit.goal, habit.start_date), longest) {
            (Some(end), Some(longest)) => end <= longest,
            _ => false,
        };
        if !fits {
            reject(
                &mut errors,
                "goal",
                format!("Goal can be at most {MAX_GOAL_YEARS} years"),
            );
        } else if planned_task_count(&habit) == 0 {
            reject(
                &mut errors,
                "goal",
                "The frequency results in a goal that is not achievable. Choose a longer goal."
                    .to_string(),
            );
        }

        if errors.is_empty() {
            Ok(habit)
        } else {
            Err(TrackerError::Validation(errors))
        }
    }

    /// Removes the habit along with its tasks, streak and achievements.
    pub fn delete_habit(&mut self, habit_id: HabitId) -> Result<HabitRecord, TrackerError> {
        self.habits
            .remove(&habit_id)
            .ok_or_else(|| TrackerError::habit_not_found(habit_id))
    }

    pub fn update_notes(&mut self, habit_id: HabitId, notes: &str) -> Result<&Habit, TrackerError> {
        let record = self
            .habits
            .get_mut(&habit_id)
            .ok_or_else(|| TrackerError::habit_not_found(habit_id))?;
        record.habit.notes = notes.trim().to_string();
        Ok(&record.habit)
    }

    /// Appends the next task of a habit; its window opens where the previous one closed.
    pub fn create_task(
        &mut self,
        habit_id: HabitId,
        due_date: DateTime<Utc>,
    ) -> Result<TaskId, TrackerError> {
        let record = self
            .habits
            .get_mut(&habit_id)
            .ok_or_else(|| TrackerError::habit_not_found(habit_id))?;
        if record.tasks.iter().any(|task| task.due_date == due_date) {
            return Err(TrackerError::DuplicateTask { habit_id, due_date });
        }
        let start_date = match record.tasks.last() {
            Some(last) if last.due_date > due_date => {
                return Err(TrackerError::InvariantViolated(format!(
                    "habit {habit_id}: task due {due_date} would precede task due {}",
                    last.due_date
                )));
            }
            Some(last) => last.due_date,
            None => record.habit.start_date,
        };

        self.next_task_id += 1;
        let task = Task {
            id: self.next_task_id,
            habit_id,
            task_number: record.tasks.len() as u32 + 1,
            start_date,
            due_date,
            completion_date: None,
            status: TaskStatus::Pending,
        };
        record.tasks.push(task);
        Ok(self.next_task_id)
    }

    /// Creates the tasks scheduled up to `horizon` that do not exist yet.
    pub fn materialize(
        &mut self,
        habit_id: HabitId,
        horizon: DateTime<Utc>,
    ) -> Result<usize, TrackerError> {
        let record = self.habit(habit_id)?;
        let last_number = record.tasks.last().map_or(0, |task| task.task_number);
        let slots: Vec<_> = Schedule::for_habit(&record.habit, horizon)
            .resume_after(last_number)
            .collect();

        for slot in &slots {
            self.create_task(habit_id, slot.due_date)?;
        }
        Ok(slots.len())
    }

    pub fn complete_task(
        &mut self,
        task_id: TaskId,
        at: DateTime<Utc>,
        policy: &LedgerPolicy,
    ) -> Result<Completion, TrackerError> {
        let (habit_id, index) = self
            .habits
            .iter()
            .find_map(|(habit_id, record)| {
                record
                    .tasks
                    .iter()
                    .position(|task| task.id == task_id)
                    .map(|index| (*habit_id, index))
            })
            .ok_or_else(|| TrackerError::task_not_found(task_id))?;
        let record = self
            .habits
            .get_mut(&habit_id)
            .ok_or_else(|| TrackerError::habit_not_found(habit_id))?;

        let task = &record.tasks[index];
        if !task.is_pending() {
            return Err(TrackerError::AlreadyResolved(task_id));
        }
        if at < task.start_date {
            return Err(TrackerError::NotStarted(task_id));
        }
        if matches!(policy.completion, CompletionPolicy::Grace(_)) && policy.is_overdue(task, at) {
            return Err(TrackerError::TooLate(task_id));
        }
        if let Some(earlier) = record.tasks[..index]
            .iter()
            .find(|earlier| policy.holds_back(earlier, at))
        {
            return Err(TrackerError::EarlierTaskOpen {
                task_id,
                earlier: earlier.id,
            });
        }

        let mut expired_earlier = 0;
        for earlier in 0..index {
            if record.tasks[earlier].is_pending() {
                record.fail_task(earlier);
                expired_earlier += 1;
            }
        }

        let task = &mut record.tasks[index];
        task.status = TaskStatus::Completed;
        task.completion_date = Some(at);
        let task = task.clone();

        let achievement = match record.streak.on_completed() {
            StreakChange::Extended {
                new_longest: Some(longest),
            } => record_if_milestone(
                &mut record.achievements,
                &mut self.next_achievement_id,
                habit_id,
                longest,
                at,
            ),
            _ => None,
        };
        record.streak.verify(&record.tasks)?;
        debug!(habit_id, task_id, current = record.streak.current_streak, "task completed");

        Ok(Completion {
            task,
            streak: record.streak.clone(),
            achievement,
            expired_earlier,
        })
    }

    /// Schedules tasks up to the lookahead horizon and fails every overdue pending task.
    ///
    /// Calling it again with the same `now` changes nothing.
    pub fn expire_overdue(
        &mut self,
        now: DateTime<Utc>,
        policy: &LedgerPolicy,
    ) -> Result<SweepReport, TrackerError> {
        let mut report = SweepReport::default();

        let horizons: Vec<(HabitId, DateTime<Utc>)> = self
            .habits
            .iter()
            .map(|(habit_id, record)| (*habit_id, record.horizon(now, policy)))
            .collect();
        for (habit_id, horizon) in horizons {
            report.materialized += self.materialize(habit_id, horizon)?;
        }

        for record in self.habits.values_mut() {
            let mut expired = 0;
            for index in 0..record.tasks.len() {
                let task = &record.tasks[index];
                if task.is_pending() && policy.is_overdue(task, now) {
                    record.fail_task(index);
                    expired += 1;
                }
            }
            if expired > 0 {
                record.streak.verify(&record.tasks)?;
                report.expired += expired;
            }
        }
        Ok(report)
    }

    pub fn tasks(&self, kind: TaskKind, period: Option<Period>, now: DateTime<Utc>) -> Vec<TaskView> {
        let today = now.date_naive();
        let mut views: Vec<TaskView> = self
            .habits
            .values()
            .filter(|record| period.is_none_or(|period| record.habit.period == period))
            .flat_map(|record| {
                record
                    .tasks
                    .iter()
                    .filter(move |task| {
                        task.is_pending()
                            && match kind {
                                TaskKind::DueToday => {
                                    task.start_date <= now
                                        && task.due_date >= now
                                        && task.due_date.date_naive() == today
                                }
                                TaskKind::Active => {
                                    task.start_date <= now && task.due_date.date_naive() > today
                                }
                                TaskKind::Upcoming => task.start_date > now,
                            }
                    })
                    .map(move |task| TaskView {
                        task: task.clone(),
                        habit: record.habit_ref(),
                    })
            })
            .collect();
        views.sort_by_key(|view| (view.task.due_date, view.task.id));
        views
    }

    pub fn due_today(&self, period: Option<Period>, now: DateTime<Utc>) -> Vec<TaskView> {
        self.tasks(TaskKind::DueToday, period, now)
    }

    pub fn active(&self, period: Option<Period>, now: DateTime<Utc>) -> Vec<TaskView> {
        self.tasks(TaskKind::Active, period, now)
    }

    pub fn upcoming(&self, period: Option<Period>, now: DateTime<Utc>) -> Vec<TaskView> {
        self.tasks(TaskKind::Upcoming, period, now)
    }
}

fn reject(errors: &mut FieldErrors, field: &str, message: String) {
    errors.entry(field.to_string()).or_default().push(message);
}

/// Accepts RFC 3339, `YYYY-MM-DDTHH:MM[:SS]` (read as UTC) or a bare date (midnight UTC).
pub fn parse_start_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(value) = DateTime::parse_from_rfc3339(raw) {
        return Some(value.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(value) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(Utc.from_utc_datetime(&value));
        }
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
}
