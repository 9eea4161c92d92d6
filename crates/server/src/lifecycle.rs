//! Task state rules. Handlers check these before touching the database; the
//! accept guard is repeated inside the UPDATE so a concurrent accept cannot
//! slip past.

use shared::TaskStatus;

use crate::{db::Task, error::AppError};

pub fn check_accept(task: &Task, actor: i64) -> Result<(), AppError> {
    if task.user_id == actor {
        return Err(AppError::BadRequest(
            "You cannot accept your own task.".to_string(),
        ));
    }
    if task.status == TaskStatus::Done {
        return Err(AppError::BadRequest("Task already completed.".to_string()));
    }
    if matches!(task.assignee_id, Some(assignee) if assignee != actor) {
        return Err(AppError::BadRequest("Task already assigned.".to_string()));
    }
    Ok(())
}

pub fn check_owner(task: &Task, actor: i64, message: &str) -> Result<(), AppError> {
    if task.user_id != actor {
        return Err(AppError::Forbidden(message.to_string()));
    }
    Ok(())
}

pub fn check_status_edit(task: &Task, next: Option<TaskStatus>) -> Result<(), AppError> {
    match next {
        Some(next) if !task.status.can_become(next) => Err(AppError::BadRequest(format!(
            "Cannot change status from {} to {}",
            task.status, next
        ))),
        _ => Ok(()),
    }
}
