use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use shared::{
    ChatMessage, ConversationSummary, MessageEnvelope, SendMessageRequest, ServerFrame,
    TaskMessageRequest,
};

use super::{auth::require_user, extract::ValidJson};
use crate::{
    conversations,
    db::{self, OVERVIEW_MESSAGE_LIMIT},
    error::AppError,
    state::AppState,
};

fn non_blank(content: &str, msg: &str) -> Result<String, AppError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest(msg.to_string()));
    }
    Ok(trimmed.to_string())
}

async fn load_task(state: &AppState, id: i64) -> Result<db::Task, AppError> {
    state
        .db
        .get_task(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Task not found".to_string()))
}

/// Store a message and relay it to the conversation's realtime room.
async fn deliver(
    state: &AppState,
    sender_id: i64,
    receiver_id: i64,
    task_id: Option<i64>,
    content: &str,
) -> Result<ChatMessage, AppError> {
    let message: ChatMessage = state
        .db
        .insert_message(sender_id, Some(receiver_id), task_id, content)
        .await?
        .into();

    if let Some(room) = conversations::room_for(&message) {
        match serde_json::to_value(&message) {
            Ok(data) => state.notify_room(&room, ServerFrame::Message { room: room.clone(), data }),
            Err(e) => tracing::warn!("Failed to encode realtime message: {}", e),
        }
    }
    Ok(message)
}

/// GET /chat/messages/:other_id
pub async fn direct_thread(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(other_id): Path<i64>,
) -> Result<Json<Vec<ChatMessage>>, AppError> {
    let user_id = require_user(&state, &headers)?;
    let messages = state.db.get_direct_messages(user_id, other_id).await?;
    Ok(Json(messages.into_iter().map(ChatMessage::from).collect()))
}

/// POST /chat/send
pub async fn send_direct(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidJson(req): ValidJson<SendMessageRequest>,
) -> Result<(StatusCode, Json<MessageEnvelope>), AppError> {
    let user_id = require_user(&state, &headers)?;
    let content = non_blank(&req.content, "Missing data")?;
    if state.db.get_user_by_id(req.receiver_id).await?.is_none() {
        return Err(AppError::NotFound("Receiver not found".to_string()));
    }

    let message = deliver(&state, user_id, req.receiver_id, None, &content).await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageEnvelope {
            msg: "Message sent".to_string(),
            message,
        }),
    ))
}

/// GET /chat/overview
pub async fn overview(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<ConversationSummary>>, AppError> {
    let user_id = require_user(&state, &headers)?;
    let messages: Vec<ChatMessage> = state
        .db
        .get_recent_messages_for_user(user_id, OVERVIEW_MESSAGE_LIMIT)
        .await?
        .into_iter()
        .map(ChatMessage::from)
        .collect();

    let mut summaries = conversations::summarize(&messages, user_id);
    let users = state
        .db
        .get_users_by_ids(&conversations::other_ids(&summaries))
        .await?;
    let profiles: Vec<_> = users.iter().map(|u| u.public()).collect();
    conversations::attach_profiles(&mut summaries, &profiles);

    Ok(Json(summaries))
}

/// GET /chat/task/:task_id
pub async fn task_thread(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(task_id): Path<i64>,
) -> Result<Json<Vec<ChatMessage>>, AppError> {
    let user_id = require_user(&state, &headers)?;
    let task = load_task(&state, task_id).await?;
    conversations::task_recipient(&task, user_id, "Not authorized for this conversation.")?;

    let messages = state.db.get_task_messages(task_id).await?;
    Ok(Json(messages.into_iter().map(ChatMessage::from).collect()))
}

/// POST /chat/task/:task_id/send
pub async fn task_send(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(task_id): Path<i64>,
    ValidJson(req): ValidJson<TaskMessageRequest>,
) -> Result<(StatusCode, Json<MessageEnvelope>), AppError> {
    let user_id = require_user(&state, &headers)?;
    let task = load_task(&state, task_id).await?;
    let recipient =
        conversations::task_recipient(&task, user_id, "Not authorized to send for this task.")?;
    let content = non_blank(&req.content, "Message content required.")?;

    let message = deliver(&state, user_id, recipient, Some(task_id), &content).await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageEnvelope {
            msg: "Message sent".to_string(),
            message,
        }),
    ))
}
