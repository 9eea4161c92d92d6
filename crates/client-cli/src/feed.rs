//! Live event feed over the realtime socket.

use anyhow::Result;
use futures::{SinkExt, StreamExt};
use shared::{ClientFrame, ConversationKey, ServerFrame};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::api::{ws_url, ApiClient};
use crate::session::Session;

/// One printable line for a frame from the server.
pub fn describe(frame: &ServerFrame) -> String {
    match frame {
        ServerFrame::Status { msg } => format!("* {}", msg),
        ServerFrame::Message { room, data } => {
            let content = data
                .get("content")
                .and_then(|c| c.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| data.to_string());
            match data.get("sender_id").and_then(|s| s.as_i64()) {
                Some(sender) => format!("[{}] user {}: {}", room, sender, content),
                None => format!("[{}] {}", room, content),
            }
        }
        ServerFrame::NewRide { data } => {
            let field = |name: &str| {
                data.get(name)
                    .and_then(|v| v.as_str())
                    .unwrap_or("?")
                    .to_string()
            };
            format!(
                "New ride: {} -> {} at {}",
                field("origin"),
                field("destination"),
                field("time")
            )
        }
        ServerFrame::Error { message } => format!("! {}", message),
    }
}

/// The user's own direct room plus every task thread they are part of.
async fn rooms_for(api: &ApiClient, session: &Session) -> Vec<String> {
    let mut rooms = vec![ConversationKey::direct(session.user_id()).to_string()];
    match api.my_tasks(session).await {
        Ok(tasks) => rooms.extend(tasks.iter().map(|t| ConversationKey::task(t.id).to_string())),
        Err(e) => tracing::warn!("Could not load tasks: {}", e),
    }
    // threads on tasks someone else owns
    match api.conversations(session).await {
        Ok(threads) => rooms.extend(
            threads
                .iter()
                .filter(|t| t.key.task_id().is_some())
                .map(|t| t.key.to_string()),
        ),
        Err(e) => tracing::warn!("Could not load conversations: {}", e),
    }
    rooms.sort();
    rooms.dedup();
    rooms
}

pub async fn run(api: &ApiClient, session: &Session) -> Result<()> {
    let url = ws_url(api.base_url());
    tracing::info!("Connecting to {}...", url);

    let (ws_stream, _) = connect_async(format!("{}?token={}", url, session.token)).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    for room in rooms_for(api, session).await {
        let join = ClientFrame::Join {
            room,
            username: Some(session.user.username.clone()),
        };
        ws_sender
            .send(Message::Text(serde_json::to_string(&join)?.into()))
            .await?;
    }
    println!("\x1b[90mListening for events (Ctrl-C to stop)\x1b[0m");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            msg = ws_receiver.next() => match msg {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<ServerFrame>(&text) {
                    Ok(frame) => println!("{}", describe(&frame)),
                    Err(e) => tracing::warn!("Failed to parse server frame: {}", e),
                },
                Some(Ok(Message::Close(_))) | None => {
                    tracing::info!("Server closed connection");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::error!("WebSocket error: {}", e);
                    break;
                }
            },
            _ = &mut ctrl_c => {
                let _ = ws_sender.send(Message::Close(None)).await;
                break;
            }
        }
    }
    Ok(())
}
