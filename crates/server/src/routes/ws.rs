use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use shared::{ClientFrame, ConversationKey, ServerFrame};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::auth::{require_user, user_from_token};
use crate::{conversations, error::AppError, realtime::RealtimeHub, state::AppState};

#[derive(Debug, Deserialize)]
pub struct WsAuth {
    token: Option<String>,
}

/// GET /ws?token=<jwt>
///
/// The bearer token may also come in the `Authorization` header.
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(auth): Query<WsAuth>,
    headers: HeaderMap,
    ws: Option<WebSocketUpgrade>,
) -> Result<Response, AppError> {
    let Some(hub) = state.hub.clone() else {
        return Err(AppError::NotFound(
            "Realtime notifications are disabled".to_string(),
        ));
    };
    let user_id = match auth.token.as_deref() {
        Some(token) => user_from_token(&state, token)?,
        None => require_user(&state, &headers)?,
    };
    let Some(ws) = ws else {
        return Err(AppError::BadRequest(
            "Expected a WebSocket upgrade".to_string(),
        ));
    };

    Ok(ws
        .on_upgrade(move |socket| handle_socket(socket, state, hub, user_id))
        .into_response())
}

async fn handle_socket(socket: WebSocket, state: AppState, hub: Arc<RealtimeHub>, user_id: i64) {
    let (mut sender, mut receiver) = socket.split();
    let connection_id = Uuid::new_v4();
    tracing::debug!(%connection_id, user_id, "Socket authenticated");

    // Channel for frames headed to this socket
    let (tx, mut rx) = mpsc::channel::<ServerFrame>(32);
    hub.register(connection_id, tx);

    let send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let text = match serde_json::to_string(&frame) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!("Failed to encode frame: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => handle_frame(&state, &hub, connection_id, user_id, &text).await,
            Message::Close(_) => break,
            _ => {}
        }
    }

    hub.unregister(&connection_id);
    send_task.abort();
}

/// Whether `user_id` may listen on `room`.
async fn authorize_room(state: &AppState, user_id: i64, room: &str) -> bool {
    let Ok(key) = room.parse::<ConversationKey>() else {
        return false;
    };
    let task = match key.task_id() {
        Some(task_id) => match state.db.get_task(task_id).await {
            Ok(task) => task,
            Err(e) => {
                tracing::warn!(room = %room, "Room lookup failed: {:#}", e);
                return false;
            }
        },
        None => None,
    };
    conversations::can_join(key, user_id, task.as_ref())
}

pub(crate) async fn handle_frame(
    state: &AppState,
    hub: &RealtimeHub,
    connection_id: Uuid,
    user_id: i64,
    text: &str,
) {
    let frame = match serde_json::from_str::<ClientFrame>(text) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::debug!(%connection_id, "Unreadable socket frame: {}", e);
            hub.send_to(&connection_id, ServerFrame::error(format!("Invalid frame: {}", e)));
            return;
        }
    };

    match frame {
        ClientFrame::Join { room, username } => {
            if !authorize_room(state, user_id, &room).await {
                tracing::warn!(%connection_id, user_id, room = %room, "Join refused");
                hub.send_to(
                    &connection_id,
                    ServerFrame::error(format!("Not authorized to join {}", room)),
                );
                return;
            }
            hub.join(connection_id, &room);
            let who = username.unwrap_or_else(|| "Someone".to_string());
            hub.emit_to_room(&room, ServerFrame::status(format!("{} joined.", who)));
        }
        ClientFrame::Leave { room, username } => {
            if !hub.is_member(&connection_id, &room) {
                return;
            }
            hub.leave(&connection_id, &room);
            let who = username.unwrap_or_else(|| "Someone".to_string());
            hub.emit_to_room(&room, ServerFrame::status(format!("{} left.", who)));
        }
        ClientFrame::Message { room, data } => {
            if !hub.is_member(&connection_id, &room) {
                hub.send_to(
                    &connection_id,
                    ServerFrame::error(format!("Join {} before sending to it", room)),
                );
                return;
            }
            hub.emit_to_room(&room, ServerFrame::Message { room: room.clone(), data });
        }
        ClientFrame::RideCreate { data } => {
            hub.broadcast(ServerFrame::NewRide { data });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::Config, db::Database};

    async fn state() -> AppState {
        let db = Database::in_memory().await.unwrap();
        db.run_migrations().await.unwrap();
        AppState::new(db, Config::default())
    }

    #[tokio::test]
    async fn test_join_then_relay() {
        let state = state().await;
        let hub = RealtimeHub::new();
        let me = Uuid::new_v4();
        let (tx, mut rx) = mpsc::channel(8);
        hub.register(me, tx);

        handle_frame(&state, &hub, me, 3, r#"{"type":"join","room":"user:3","username":"bob"}"#)
            .await;
        match rx.recv().await {
            Some(ServerFrame::Status { msg }) => assert_eq!(msg, "bob joined."),
            other => panic!("Expected status frame, got {:?}", other),
        }

        handle_frame(
            &state,
            &hub,
            me,
            3,
            r#"{"type":"message","room":"user:3","data":{"content":"hi"}}"#,
        )
        .await;
        match rx.recv().await {
            Some(ServerFrame::Message { room, data }) => {
                assert_eq!(room, "user:3");
                assert_eq!(data["content"], "hi");
            }
            other => panic!("Expected message frame, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_foreign_rooms_are_refused() {
        let state = state().await;
        let hub = RealtimeHub::new();
        let me = Uuid::new_v4();
        let (tx, mut rx) = mpsc::channel(8);
        hub.register(me, tx);

        handle_frame(&state, &hub, me, 3, r#"{"type":"join","room":"user:4"}"#).await;
        assert!(matches!(rx.recv().await, Some(ServerFrame::Error { .. })));
        assert_eq!(hub.room_size("user:4"), 0);

        // no such task
        handle_frame(&state, &hub, me, 3, r#"{"type":"join","room":"task:99"}"#).await;
        assert!(matches!(rx.recv().await, Some(ServerFrame::Error { .. })));

        handle_frame(&state, &hub, me, 3, r#"{"type":"join","room":"lobby"}"#).await;
        assert!(matches!(rx.recv().await, Some(ServerFrame::Error { .. })));

        // relaying needs membership
        handle_frame(
            &state,
            &hub,
            me,
            3,
            r#"{"type":"message","room":"user:4","data":{"content":"hi"}}"#,
        )
        .await;
        assert!(matches!(rx.recv().await, Some(ServerFrame::Error { .. })));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_bad_frame_gets_error_reply() {
        let state = state().await;
        let hub = RealtimeHub::new();
        let me = Uuid::new_v4();
        let (tx, mut rx) = mpsc::channel(8);
        hub.register(me, tx);

        handle_frame(&state, &hub, me, 1, "not json").await;
        assert!(matches!(rx.recv().await, Some(ServerFrame::Error { .. })));
    }
}
