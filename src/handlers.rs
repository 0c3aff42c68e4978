use crate::analysis::{self, build_analysis_at, DEFAULT_WINDOW_DAYS};
use crate::errors::{AppError, TrackerError};
use crate::ledger::TaskKind;
use crate::models::{
    AnalysisQuery, AnalysisResponse, CompleteTaskRequest, CompleteTaskResponse,
    CreateHabitResponse, HabitDetailResponse, HabitId, HabitSummary, HabitsResponse,
    HealthResponse, MessageResponse, NewHabitRequest, NotesRequest, Period, StruggledHabit,
    SweepReport, TaskQuery, TasksResponse,
};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let tracker = state.tracker.read().await;
    Json(HealthResponse {
        status: "healthy",
        habits: tracker.len(),
        data_path: state.data_path.display().to_string(),
    })
}

pub async fn list_habits(State(state): State<AppState>) -> Json<HabitsResponse> {
    let now = now();
    let tracker = state.tracker.read().await;
    Json(HabitsResponse {
        habits: analysis::habits_by_period(&tracker, None, now),
    })
}

pub async fn create_habit(
    State(state): State<AppState>,
    Json(payload): Json<NewHabitRequest>,
) -> Result<Json<CreateHabitResponse>, AppError> {
    let now = now();
    let policy = state.policy;
    let habit_id = state
        .transact(|tracker| tracker.create_habit(&payload, now, &policy))
        .await?;

    let name = payload.name.trim();
    info!(habit_id, "habit '{name}' created");
    Ok(Json(CreateHabitResponse {
        success: true,
        message: format!("{name} Habit created"),
        habit_id,
    }))
}

pub async fn get_habit(
    State(state): State<AppState>,
    Path(habit_id): Path<HabitId>,
) -> Result<Json<HabitDetailResponse>, AppError> {
    let now = now();
    let tracker = state.tracker.read().await;
    let record = tracker.habit(habit_id)?;
    Ok(Json(HabitDetailResponse {
        habit: record.summary(now),
        tasks: record.tasks.clone(),
        streak: record.streak.clone(),
        achievements: record.achievements.clone(),
    }))
}

pub async fn update_notes(
    State(state): State<AppState>,
    Path(habit_id): Path<HabitId>,
    Json(payload): Json<NotesRequest>,
) -> Result<Json<HabitSummary>, AppError> {
    let now = now();
    let summary = state
        .transact(|tracker| {
            tracker.update_notes(habit_id, &payload.notes)?;
            Ok(tracker.habit(habit_id)?.summary(now))
        })
        .await?;
    Ok(Json(summary))
}

pub async fn delete_habit(
    State(state): State<AppState>,
    Path(habit_id): Path<HabitId>,
) -> Result<Json<MessageResponse>, AppError> {
    let removed = state
        .transact(|tracker| tracker.delete_habit(habit_id))
        .await?;

    info!(habit_id, tasks = removed.tasks.len(), "habit deleted");
    Ok(Json(MessageResponse {
        success: true,
        message: format!("{} habit deleted successfully", removed.habit.name),
    }))
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Query(query): Query<TaskQuery>,
) -> Result<Json<TasksResponse>, AppError> {
    let kind: TaskKind = query.kind.as_deref().unwrap_or("due_today").parse()?;
    let period = parse_period(query.period.as_deref())?;
    let now = now();

    if let Err(err) = state.sweep(now).await {
        warn!("sweep before task listing failed: {err}");
    }

    let tracker = state.tracker.read().await;
    Ok(Json(TasksResponse {
        tasks: tracker.tasks(kind, period, now),
    }))
}

pub async fn complete_task(
    State(state): State<AppState>,
    Json(payload): Json<CompleteTaskRequest>,
) -> Result<Json<CompleteTaskResponse>, AppError> {
    let now = now();
    let policy = state.policy;
    let task_id = payload.task_id;
    let (completion, habit_name) = state
        .transact(|tracker| {
            if let Some(habit_id) = payload.habit_id {
                let owner = tracker.task(task_id).map(|task| task.habit_id);
                if owner.is_some() && owner != Some(habit_id) {
                    return Err(TrackerError::NotFound(format!(
                        "task {task_id} of habit {habit_id}"
                    )));
                }
            }
            let completion = tracker.complete_task(task_id, now, &policy)?;
            let name = tracker.habit(completion.task.habit_id)?.habit.name.clone();
            Ok((completion, name))
        })
        .await?;

    info!(
        task_id,
        habit_id = completion.task.habit_id,
        current_streak = completion.streak.current_streak,
        "task completed"
    );
    Ok(Json(CompleteTaskResponse {
        success: true,
        message: format!("{habit_name} task marked as completed"),
        task: completion.task,
        streak: completion.streak,
        achievement: completion.achievement,
    }))
}

pub async fn expire_tasks(State(state): State<AppState>) -> Result<Json<SweepReport>, AppError> {
    let report = state.sweep(now()).await?;
    Ok(Json(report))
}

pub async fn get_analysis(
    State(state): State<AppState>,
    Query(query): Query<AnalysisQuery>,
) -> Result<Json<AnalysisResponse>, AppError> {
    let window = parse_window(query.window_days)?;
    let tracker = state.tracker.read().await;
    Ok(Json(build_analysis_at(now(), &tracker, window)))
}

pub async fn get_struggled(
    State(state): State<AppState>,
    Query(query): Query<AnalysisQuery>,
) -> Result<Json<Option<StruggledHabit>>, AppError> {
    let period = parse_period(query.period.as_deref())?
        .ok_or_else(|| AppError::bad_request("period is required"))?;
    let window = parse_window(query.window_days)?;
    let tracker = state.tracker.read().await;
    Ok(Json(analysis::most_struggled(&tracker, period, window, now())))
}

pub async fn get_habit_analysis(
    State(state): State<AppState>,
    Path(habit_id): Path<HabitId>,
) -> Result<Json<HabitSummary>, AppError> {
    let tracker = state.tracker.read().await;
    Ok(Json(analysis::habit_analysis(&tracker, habit_id, now())?))
}

/// `None` for a missing, empty or `all` period.
fn parse_period(raw: Option<&str>) -> Result<Option<Period>, AppError> {
    match raw.map(str::trim) {
        None | Some("") | Some("all") => Ok(None),
        Some(value) => Ok(Some(value.parse()?)),
    }
}

fn parse_window(days: Option<i64>) -> Result<Duration, AppError> {
    match days.unwrap_or(DEFAULT_WINDOW_DAYS) {
        days @ 1..=3660 => Ok(Duration::days(days)),
        _ => Err(AppError::bad_request("window_days must be between 1 and 3660")),
    }
}

fn now() -> DateTime<Utc> {
    Utc::now()
}
