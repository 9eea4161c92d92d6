use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use shared::{ProfileEnvelope, PublicProfile, UpdateProfileRequest, UserProfile};

use super::{auth::require_user, extract::ValidJson};
use crate::{error::AppError, state::AppState};

fn user_not_found() -> AppError {
    AppError::NotFound("User not found".to_string())
}

/// GET /users/me
pub async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UserProfile>, AppError> {
    let user_id = require_user(&state, &headers)?;
    let user = state
        .db
        .get_user_by_id(user_id)
        .await?
        .ok_or_else(user_not_found)?;
    Ok(Json(user.profile()))
}

/// PUT /users/me
pub async fn update_me(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidJson(req): ValidJson<UpdateProfileRequest>,
) -> Result<Json<ProfileEnvelope>, AppError> {
    let user_id = require_user(&state, &headers)?;
    let username = req.username.as_deref().map(str::trim);
    if username == Some("") {
        return Err(AppError::BadRequest("Username cannot be empty".to_string()));
    }

    let user = state
        .db
        .update_user_profile(
            user_id,
            username,
            req.first_name.as_deref().map(str::trim),
            req.last_name.as_deref().map(str::trim),
            req.bio.as_deref(),
        )
        .await?
        .ok_or_else(user_not_found)?;
    tracing::info!(user_id, "Profile updated");

    Ok(Json(ProfileEnvelope {
        msg: "Profile updated".to_string(),
        user: user.profile(),
    }))
}

/// GET /users/:id
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<PublicProfile>, AppError> {
    let user = state
        .db
        .get_user_by_id(id)
        .await?
        .ok_or_else(user_not_found)?;
    Ok(Json(user.public()))
}
