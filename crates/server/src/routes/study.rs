use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use shared::{
    Campus, ConnectResponse, CreateStudySessionRequest, MsgResponse, PublicProfile, StudyQuery,
    StudySession, StudySessionEnvelope, UpdateStudySessionRequest,
};
use std::collections::HashMap;

use super::{auth::require_user, extract::ValidJson};
use crate::{
    db::{self, NewStudySession, StudySessionChanges},
    error::AppError,
    state::AppState,
};

fn parse_campus(input: &str) -> Result<Campus, AppError> {
    input.parse().map_err(|_| {
        let allowed: Vec<&str> = Campus::ALL.iter().map(|c| c.as_str()).collect();
        AppError::BadRequest(format!("Invalid campus. Allowed: {}", allowed.join(", ")))
    })
}

/// Trimmed text, `None` when only whitespace is left.
fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

async fn load_session(state: &AppState, id: i64) -> Result<db::StudySession, AppError> {
    state
        .db
        .get_study_session(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Study session not found".to_string()))
}

async fn owner_profile(state: &AppState, user_id: i64) -> Result<Option<PublicProfile>, AppError> {
    Ok(state.db.get_user_by_id(user_id).await?.map(|u| u.public()))
}

/// GET /study?q=&campus=
pub async fn list_sessions(
    State(state): State<AppState>,
    Query(query): Query<StudyQuery>,
) -> Result<Json<Vec<StudySession>>, AppError> {
    let campus = match non_empty(query.campus.as_deref()) {
        Some(name) => match name.parse::<Campus>() {
            Ok(campus) => Some(campus),
            // No session can be held at an unknown campus
            Err(_) => return Ok(Json(vec![])),
        },
        None => None,
    };
    let sessions = state
        .db
        .list_study_sessions(campus, non_empty(query.q.as_deref()))
        .await?;

    let mut owner_ids: Vec<i64> = sessions.iter().map(|s| s.user_id).collect();
    owner_ids.sort_unstable();
    owner_ids.dedup();
    let owners: HashMap<i64, PublicProfile> = state
        .db
        .get_users_by_ids(&owner_ids)
        .await?
        .iter()
        .map(|u| (u.id, u.public()))
        .collect();

    Ok(Json(
        sessions
            .into_iter()
            .map(|s| {
                let owner = owners.get(&s.user_id).cloned();
                s.into_api(owner)
            })
            .collect(),
    ))
}

/// POST /study
pub async fn create_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidJson(req): ValidJson<CreateStudySessionRequest>,
) -> Result<(StatusCode, Json<StudySessionEnvelope>), AppError> {
    let user_id = require_user(&state, &headers)?;
    let course = non_empty(Some(req.course.as_str()))
        .ok_or_else(|| AppError::BadRequest("Missing course".to_string()))?;
    let campus = match non_empty(req.campus.as_deref()) {
        Some(name) => parse_campus(name)?,
        None => Campus::default(),
    };

    let session = state
        .db
        .create_study_session(&NewStudySession {
            user_id,
            course,
            available: req.available,
            campus,
            teacher: req.teacher.trim(),
            description: req.description.trim(),
        })
        .await?;
    tracing::info!(session_id = session.id, owner = user_id, "Study session created");

    let owner = owner_profile(&state, user_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(StudySessionEnvelope {
            msg: "Study session created".to_string(),
            session: session.into_api(owner),
        }),
    ))
}

/// PUT /study/:id
pub async fn update_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    ValidJson(req): ValidJson<UpdateStudySessionRequest>,
) -> Result<Json<StudySessionEnvelope>, AppError> {
    let user_id = require_user(&state, &headers)?;
    let session = load_session(&state, id).await?;
    if session.user_id != user_id {
        return Err(AppError::Forbidden("Unauthorized".to_string()));
    }

    let changes = StudySessionChanges {
        // A blank course keeps the current one
        course: non_empty(req.course.as_deref()).map(str::to_string),
        available: req.available,
        campus: non_empty(req.campus.as_deref()).map(parse_campus).transpose()?,
        teacher: req.teacher.as_deref().map(|t| t.trim().to_string()),
        description: req.description.as_deref().map(|d| d.trim().to_string()),
    };

    let session = state
        .db
        .update_study_session(id, &changes)
        .await?
        .ok_or_else(|| AppError::NotFound("Study session not found".to_string()))?;
    let owner = owner_profile(&state, user_id).await?;
    Ok(Json(StudySessionEnvelope {
        msg: "Session updated".to_string(),
        session: session.into_api(owner),
    }))
}

/// DELETE /study/:id
pub async fn delete_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<MsgResponse>, AppError> {
    let user_id = require_user(&state, &headers)?;
    let session = load_session(&state, id).await?;
    if session.user_id != user_id {
        return Err(AppError::Forbidden("Unauthorized".to_string()));
    }

    state.db.delete_study_session(id).await?;
    Ok(Json(MsgResponse::new("Session deleted")))
}

/// POST /study/:id/connect
pub async fn connect_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<ConnectResponse>, AppError> {
    let user_id = require_user(&state, &headers)?;
    let session = load_session(&state, id).await?;
    if session.user_id == user_id {
        return Err(AppError::BadRequest("You own this session.".to_string()));
    }

    let owner = owner_profile(&state, session.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Owner not found".to_string()))?;
    tracing::debug!(session_id = id, requester = user_id, "Study session connect");

    Ok(Json(ConnectResponse {
        msg: "Connected".to_string(),
        owner_id: owner.id,
        owner: owner.clone(),
        session: session.into_api(Some(owner)),
    }))
}
