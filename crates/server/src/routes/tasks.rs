use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use shared::{CreateTaskRequest, MsgResponse, Task, TaskEnvelope, UpdateTaskRequest};

use super::{auth::require_user, extract::ValidJson};
use crate::{db, error::AppError, lifecycle, state::AppState};

async fn load_task(state: &AppState, id: i64) -> Result<db::Task, AppError> {
    state
        .db
        .get_task(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Task not found".to_string()))
}

fn envelope(msg: &str, task: db::Task) -> Json<TaskEnvelope> {
    Json(TaskEnvelope {
        msg: msg.to_string(),
        task: task.into(),
    })
}

/// GET /tasks
pub async fn list_tasks(State(state): State<AppState>) -> Result<Json<Vec<Task>>, AppError> {
    let tasks = state.db.list_tasks().await?;
    Ok(Json(tasks.into_iter().map(Task::from).collect()))
}

/// GET /tasks/mine
pub async fn list_my_tasks(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Task>>, AppError> {
    let user_id = require_user(&state, &headers)?;
    let tasks = state.db.list_tasks_by_owner(user_id).await?;
    Ok(Json(tasks.into_iter().map(Task::from).collect()))
}

/// POST /tasks
pub async fn create_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidJson(req): ValidJson<CreateTaskRequest>,
) -> Result<(StatusCode, Json<TaskEnvelope>), AppError> {
    let user_id = require_user(&state, &headers)?;
    let title = req.title.trim();
    if title.is_empty() {
        return Err(AppError::BadRequest("Missing title".to_string()));
    }
    if state.db.get_user_by_id(user_id).await?.is_none() {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    let task = state.db.create_task(user_id, title, &req.description).await?;
    tracing::info!(task_id = task.id, owner = user_id, "Task created");
    Ok((StatusCode::CREATED, envelope("Task created", task)))
}

/// GET /tasks/:id
pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Task>, AppError> {
    Ok(Json(load_task(&state, id).await?.into()))
}

/// PUT /tasks/:id
pub async fn update_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    ValidJson(req): ValidJson<UpdateTaskRequest>,
) -> Result<Json<TaskEnvelope>, AppError> {
    let user_id = require_user(&state, &headers)?;
    let task = load_task(&state, id).await?;
    lifecycle::check_owner(&task, user_id, "Unauthorized")?;
    lifecycle::check_status_edit(&task, req.status)?;

    let title = req.title.as_deref().map(str::trim);
    if title == Some("") {
        return Err(AppError::BadRequest("Missing title".to_string()));
    }

    let task = state
        .db
        .update_task(id, title, req.description.as_deref(), req.status)
        .await?
        .ok_or_else(|| AppError::NotFound("Task not found".to_string()))?;
    Ok(envelope("Task updated", task))
}

/// DELETE /tasks/:id
pub async fn delete_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<MsgResponse>, AppError> {
    let user_id = require_user(&state, &headers)?;
    let task = load_task(&state, id).await?;
    lifecycle::check_owner(&task, user_id, "Unauthorized")?;

    state.db.delete_task(id).await?;
    tracing::info!(task_id = id, "Task deleted");
    Ok(Json(MsgResponse::new("Task deleted")))
}

/// POST /tasks/:id/accept
pub async fn accept_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<TaskEnvelope>, AppError> {
    let user_id = require_user(&state, &headers)?;
    let task = load_task(&state, id).await?;
    lifecycle::check_accept(&task, user_id)?;

    match state.db.assign_task(id, user_id).await? {
        Some(task) => {
            tracing::info!(task_id = id, assignee = user_id, "Task accepted");
            Ok(envelope("Task accepted", task))
        }
        None => {
            // Lost a race with another accept or a completion; report current state.
            let current = load_task(&state, id).await?;
            lifecycle::check_accept(&current, user_id)?;
            Err(AppError::BadRequest("Task already assigned.".to_string()))
        }
    }
}

/// POST /tasks/:id/done
pub async fn mark_task_done(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<TaskEnvelope>, AppError> {
    let user_id = require_user(&state, &headers)?;
    let task = load_task(&state, id).await?;
    lifecycle::check_owner(&task, user_id, "Only the owner can mark done.")?;

    let task = state
        .db
        .mark_task_done(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Task not found".to_string()))?;
    tracing::info!(task_id = id, "Task marked done");
    Ok(envelope("Task marked done", task))
}
