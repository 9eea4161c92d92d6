use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Identifies a chat thread.
///
/// Task threads are shared by the task owner and its assignee; direct threads
/// are keyed by the counterpart's user id from the viewer's perspective.
/// The string form (`task:<id>` / `user:<id>`) doubles as the realtime room
/// name and as the key of the client's local store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ConversationKey {
    #[serde(rename = "task")]
    Task { task_id: i64 },
    #[serde(rename = "dm")]
    Direct { user_id: i64 },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseConversationKeyError {
    #[error("conversation key must look like task:<id> or user:<id>, got {0:?}")]
    Malformed(String),
}

impl ConversationKey {
    pub fn task(task_id: i64) -> Self {
        Self::Task { task_id }
    }

    pub fn direct(user_id: i64) -> Self {
        Self::Direct { user_id }
    }

    pub fn task_id(&self) -> Option<i64> {
        match self {
            Self::Task { task_id } => Some(*task_id),
            Self::Direct { .. } => None,
        }
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Task { task_id } => write!(f, "task:{}", task_id),
            Self::Direct { user_id } => write!(f, "user:{}", user_id),
        }
    }
}

impl FromStr for ConversationKey {
    type Err = ParseConversationKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ParseConversationKeyError::Malformed(s.to_string());
        let (kind, id) = s.split_once(':').ok_or_else(malformed)?;
        let id: i64 = id.trim().parse().map_err(|_| malformed())?;
        match kind.trim() {
            "task" => Ok(Self::task(id)),
            "user" => Ok(Self::direct(id)),
            _ => Err(malformed()),
        }
    }
}
