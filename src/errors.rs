use crate::models::{HabitId, TaskId};
use axum::{http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// Field name to the messages reported against it.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("invalid period '{0}': expected daily, weekly or monthly")]
    InvalidPeriod(String),

    #[error("habit {habit_id} already has a task due at {due_date}")]
    DuplicateTask {
        habit_id: HabitId,
        due_date: DateTime<Utc>,
    },

    #[error("{0} not found")]
    NotFound(String),

    #[error("task {0} is already resolved")]
    AlreadyResolved(TaskId),

    #[error("task {0} is past its due date")]
    TooLate(TaskId),

    #[error("task {0} has not started yet")]
    NotStarted(TaskId),

    #[error("task {task_id} waits for task {earlier}, which can still be completed")]
    EarlierTaskOpen { task_id: TaskId, earlier: TaskId },

    #[error("validation failed")]
    Validation(FieldErrors),

    #[error("ledger invariant violated: {0}")]
    InvariantViolated(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl TrackerError {
    pub fn habit_not_found(id: HabitId) -> Self {
        Self::NotFound(format!("habit {id}"))
    }

    pub fn task_not_found(id: TaskId) -> Self {
        Self::NotFound(format!("task {id}"))
    }

    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.to_string(), vec![message.into()]);
        Self::Validation(errors)
    }
}

impl From<std::io::Error> for TrackerError {
    fn from(err: std::io::Error) -> Self {
        Self::StorageUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for TrackerError {
    fn from(err: serde_json::Error) -> Self {
        Self::StorageUnavailable(err.to_string())
    }
}

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
    pub errors: Option<FieldErrors>,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            errors: None,
        }
    }
}

impl From<TrackerError> for AppError {
    fn from(err: TrackerError) -> Self {
        let status = match &err {
            TrackerError::InvalidPeriod(_) | TrackerError::Validation(_) => StatusCode::BAD_REQUEST,
            TrackerError::NotFound(_) => StatusCode::NOT_FOUND,
            TrackerError::DuplicateTask { .. }
            | TrackerError::AlreadyResolved(_)
            | TrackerError::EarlierTaskOpen { .. } => StatusCode::CONFLICT,
            TrackerError::TooLate(_) | TrackerError::NotStarted(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            TrackerError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            TrackerError::InvariantViolated(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = match &err {
            TrackerError::Validation(_) => "Validation failed".to_string(),
            other => other.to_string(),
        };
        let errors = match err {
            TrackerError::Validation(errors) => Some(errors),
            _ => None,
        };
        Self {
            status,
            message,
            errors,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<FieldErrors>,
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let body = ErrorBody {
            error: self.message,
            errors: self.errors,
        };
        (self.status, Json(body)).into_response()
    }
}
