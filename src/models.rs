use crate::errors::TrackerError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

pub type HabitId = u64;
pub type TaskId = u64;
pub type AchievementId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Daily,
    Weekly,
    Monthly,
}

impl Period {
    pub const ALL: [Period; 3] = [Period::Daily, Period::Weekly, Period::Monthly];

    pub fn as_str(self) -> &'static str {
        match self {
            Period::Daily => "daily",
            Period::Weekly => "weekly",
            Period::Monthly => "monthly",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = TrackerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Period::Daily),
            "weekly" => Ok(Period::Weekly),
            "monthly" => Ok(Period::Monthly),
            _ => Err(TrackerError::InvalidPeriod(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoalUnit {
    Day,
    Week,
    Month,
    Year,
}

/// How long a habit is tracked for, written as `"<amount> <unit>"` (e.g. `"3 months"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GoalDuration {
    pub amount: u32,
    pub unit: GoalUnit,
}

impl FromStr for GoalDuration {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut parts = value.split_whitespace();
        let (Some(amount), Some(unit), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(format!("goal '{value}' must look like '3 days' or '1 month'"));
        };
        let amount: u32 = amount
            .parse()
            .map_err(|_| format!("goal amount '{amount}' is not a whole number"))?;
        if amount == 0 {
            return Err("goal amount must be at least 1".to_string());
        }
        let unit = match unit.to_ascii_lowercase().trim_end_matches('s') {
            "day" => GoalUnit::Day,
            "week" => GoalUnit::Week,
            "month" => GoalUnit::Month,
            "year" => GoalUnit::Year,
            other => return Err(format!("goal unit '{other}' is not one of day, week, month, year")),
        };
        Ok(Self { amount, unit })
    }
}

impl TryFrom<String> for GoalDuration {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<GoalDuration> for String {
    fn from(goal: GoalDuration) -> Self {
        goal.to_string()
    }
}

impl fmt::Display for GoalDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self.unit {
            GoalUnit::Day => "day",
            GoalUnit::Week => "week",
            GoalUnit::Month => "month",
            GoalUnit::Year => "year",
        };
        let plural = if self.amount == 1 { "" } else { "s" };
        write!(f, "{} {unit}{plural}", self.amount)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Habit {
    pub id: HabitId,
    pub name: String,
    pub frequency: u32,
    pub period: Period,
    pub goal: GoalDuration,
    pub start_date: DateTime<Utc>,
    pub notes: String,
    pub creation_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub habit_id: HabitId,
    pub task_number: u32,
    pub start_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub completion_date: Option<DateTime<Utc>>,
    pub status: TaskStatus,
}

impl Task {
    pub fn is_pending(&self) -> bool {
        self.status == TaskStatus::Pending
    }

    /// When the task left `Pending`; failed tasks resolve at their due date.
    pub fn resolved_at(&self) -> Option<DateTime<Utc>> {
        match self.status {
            TaskStatus::Pending => None,
            TaskStatus::Completed => self.completion_date,
            TaskStatus::Failed => Some(self.due_date),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Streak {
    pub habit_id: HabitId,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub num_of_completed_tasks: u32,
    pub num_of_failed_tasks: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Achievement {
    pub id: AchievementId,
    pub habit_id: HabitId,
    pub title: String,
    pub date: DateTime<Utc>,
    pub streak_length: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewHabitRequest {
    #[serde(default)]
    pub name: String,
    pub frequency: Option<i64>,
    #[serde(default)]
    pub period: String,
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub start_date: String,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NotesRequest {
    pub notes: String,
}

#[derive(Debug, Deserialize)]
pub struct CompleteTaskRequest {
    pub task_id: TaskId,
    pub habit_id: Option<HabitId>,
}

#[derive(Debug, Deserialize)]
pub struct TaskQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub period: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AnalysisQuery {
    pub period: Option<String>,
    pub window_days: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HabitSummary {
    pub id: HabitId,
    pub name: String,
    pub period: Period,
    pub frequency: u32,
    pub goal: GoalDuration,
    pub notes: String,
    pub num_of_tasks: u32,
    pub in_progress: u32,
    pub progress: u8,
    pub streak: Streak,
    pub creation_time: DateTime<Utc>,
    pub start_date: DateTime<Utc>,
    pub goal_end_date: Option<DateTime<Utc>>,
    pub completion_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HabitRef {
    pub id: HabitId,
    pub name: String,
    pub period: Period,
    pub notes: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskView {
    #[serde(flatten)]
    pub task: Task,
    pub habit: HabitRef,
}

#[derive(Debug, Serialize)]
pub struct HabitsResponse {
    pub habits: Vec<HabitSummary>,
}

#[derive(Debug, Serialize)]
pub struct HabitDetailResponse {
    pub habit: HabitSummary,
    pub tasks: Vec<Task>,
    pub streak: Streak,
    pub achievements: Vec<Achievement>,
}

#[derive(Debug, Serialize)]
pub struct CreateHabitResponse {
    pub success: bool,
    pub message: String,
    pub habit_id: HabitId,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct TasksResponse {
    pub tasks: Vec<TaskView>,
}

#[derive(Debug, Serialize)]
pub struct CompleteTaskResponse {
    pub success: bool,
    pub message: String,
    pub task: Task,
    pub streak: Streak,
    pub achievement: Option<Achievement>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub expired: usize,
    pub materialized: usize,
}

#[derive(Debug, Serialize)]
pub struct StruggledHabit {
    pub period: Period,
    pub failed_in_window: u32,
    pub habit: HabitSummary,
}

#[derive(Debug, Serialize)]
pub struct DailyPoint {
    pub date: String,
    pub completed: u32,
    pub failed: u32,
}

#[derive(Debug, Serialize)]
pub struct WeeklyPoint {
    pub week: String,
    pub start_date: String,
    pub end_date: String,
    pub completed: u32,
    pub failed: u32,
}

#[derive(Debug, Serialize)]
pub struct ActivityResponse {
    pub last_7_days: Vec<DailyPoint>,
    pub weekly_totals: Vec<WeeklyPoint>,
}

#[derive(Debug, Serialize)]
pub struct AnalysisResponse {
    pub all_habits: Vec<HabitSummary>,
    pub daily_habits: Vec<HabitSummary>,
    pub weekly_habits: Vec<HabitSummary>,
    pub monthly_habits: Vec<HabitSummary>,
    pub completed_habits: Vec<HabitSummary>,
    pub longest_streak_habit: Option<HabitSummary>,
    pub longest_current_streak_habit: Option<HabitSummary>,
    pub most_struggled: Vec<StruggledHabit>,
    pub window_days: i64,
    pub activity: ActivityResponse,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub habits: usize,
    pub data_path: String,
}
