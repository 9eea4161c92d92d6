//! Conversation routing: which thread a message belongs to and who is on the
//! other end of it.

use shared::{ChatMessage, ConversationKey, ConversationSummary, PublicProfile};
use std::collections::HashMap;

use crate::{db::Task, error::AppError};

/// The party the viewer is talking to in `message`, if any.
fn counterpart(message: &ChatMessage, viewer: i64) -> Option<i64> {
    if message.sender_id == viewer {
        message.receiver_id
    } else {
        Some(message.sender_id)
    }
}

/// Thread a message belongs to from the viewer's side. Direct messages with no
/// counterpart cannot be addressed and are skipped.
pub fn key_for(message: &ChatMessage, viewer: i64) -> Option<ConversationKey> {
    match message.task_id {
        Some(task_id) => Some(ConversationKey::task(task_id)),
        None => counterpart(message, viewer).map(ConversationKey::direct),
    }
}

/// Reduce messages to one summary per thread holding its newest message,
/// ordered by last activity, newest first. Input order does not matter.
pub fn summarize(messages: &[ChatMessage], viewer: i64) -> Vec<ConversationSummary> {
    let mut latest: HashMap<ConversationKey, &ChatMessage> = HashMap::new();
    for message in messages {
        let Some(key) = key_for(message, viewer) else {
            continue;
        };
        latest
            .entry(key)
            .and_modify(|current| {
                if (message.timestamp, message.id) > (current.timestamp, current.id) {
                    *current = message;
                }
            })
            .or_insert(message);
    }

    let mut summaries: Vec<ConversationSummary> = latest
        .into_iter()
        .map(|(key, message)| ConversationSummary {
            key,
            other_id: counterpart(message, viewer),
            other: None,
            last_message: message.clone(),
            updated_at: message.timestamp,
        })
        .collect();

    summaries.sort_by(|a, b| {
        (b.updated_at, b.last_message.id).cmp(&(a.updated_at, a.last_message.id))
    });
    summaries
}

/// Counterpart ids that need a profile lookup.
pub fn other_ids(summaries: &[ConversationSummary]) -> Vec<i64> {
    let mut ids: Vec<i64> = summaries.iter().filter_map(|s| s.other_id).collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

pub fn attach_profiles(summaries: &mut [ConversationSummary], profiles: &[PublicProfile]) {
    let by_id: HashMap<i64, &PublicProfile> = profiles.iter().map(|p| (p.id, p)).collect();
    for summary in summaries {
        summary.other = summary
            .other_id
            .and_then(|id| by_id.get(&id))
            .map(|p| (*p).clone());
    }
}

/// Recipient of a task-thread message sent by `actor`: the assignee when the
/// owner writes, the owner otherwise.
pub fn task_recipient(task: &Task, actor: i64, denied: &str) -> Result<i64, AppError> {
    let Some(assignee) = task.assignee_id else {
        return Err(AppError::BadRequest("Task has no assignee yet.".to_string()));
    };
    if actor == task.user_id {
        Ok(assignee)
    } else if actor == assignee {
        Ok(task.user_id)
    } else {
        Err(AppError::Forbidden(denied.to_string()))
    }
}

/// Realtime room that should hear about a newly stored message.
pub fn room_for(message: &ChatMessage) -> Option<String> {
    match message.task_id {
        Some(task_id) => Some(ConversationKey::task(task_id).to_string()),
        None => message
            .receiver_id
            .map(|id| ConversationKey::direct(id).to_string()),
    }
}

/// Whether `viewer` may listen on the room for `key`. Direct rooms belong to
/// their user alone; task rooms to the task's owner and assignee.
pub fn can_join(key: ConversationKey, viewer: i64, task: Option<&Task>) -> bool {
    match key {
        ConversationKey::Direct { user_id } => user_id == viewer,
        ConversationKey::Task { task_id } => task.is_some_and(|t| {
            t.id == task_id && (t.user_id == viewer || t.assignee_id == Some(viewer))
        }),
    }
}
