use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{get, patch, post},
    Router,
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/api/habits",
            get(handlers::list_habits).post(handlers::create_habit),
        )
        .route(
            "/api/habits/:id",
            get(handlers::get_habit).delete(handlers::delete_habit),
        )
        .route("/api/habits/:id/notes", patch(handlers::update_notes))
        .route("/api/tasks", get(handlers::list_tasks))
        .route("/api/tasks/complete", post(handlers::complete_task))
        .route("/api/tasks/expire", post(handlers::expire_tasks))
        .route("/api/analysis", get(handlers::get_analysis))
        .route("/api/analysis/struggled", get(handlers::get_struggled))
        .route("/api/analysis/habits/:id", get(handlers::get_habit_analysis))
        .with_state(state)
}
