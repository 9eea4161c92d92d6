use axum::{extract::State, Json};
use shared::{HealthResponse, TaskOverview, TaskOverviewItem};

use crate::{error::AppError, state::AppState};

/// GET /
pub async fn banner() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ErrandBuddy Backend Running".to_string(),
    })
}

/// GET /health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// GET /overview
pub async fn task_overview(State(state): State<AppState>) -> Result<Json<TaskOverview>, AppError> {
    let tasks: Vec<TaskOverviewItem> = state
        .db
        .list_tasks_with_owner()
        .await?
        .into_iter()
        .map(TaskOverviewItem::from)
        .collect();

    Ok(Json(TaskOverview {
        count: tasks.len(),
        tasks,
    }))
}
