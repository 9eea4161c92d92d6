use serde::{Deserialize, Serialize};

// ============================================================================
// Realtime socket frames
// ============================================================================

/// Frames sent from a socket client to the server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Subscribe to a room (a conversation key such as `task:4`)
    Join { room: String, username: Option<String> },

    /// Unsubscribe from a room
    Leave { room: String, username: Option<String> },

    /// Relay an arbitrary payload to everyone in a room
    Message { room: String, data: serde_json::Value },

    /// Announce a ride to every connected client
    RideCreate { data: serde_json::Value },
}

/// Frames sent from the server to socket clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Room membership notice
    Status { msg: String },

    /// Payload relayed into a room
    Message { room: String, data: serde_json::Value },

    /// A ride was posted
    NewRide { data: serde_json::Value },

    /// Frame could not be handled
    Error { message: String },
}

impl ServerFrame {
    pub fn status(msg: impl Into<String>) -> Self {
        Self::Status { msg: msg.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
