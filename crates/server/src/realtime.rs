use dashmap::DashMap;
use shared::ServerFrame;
use std::collections::HashSet;
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

/// Tracks live socket connections and the rooms they joined, and fans frames
/// out to them. Delivery never waits: a closed connection or one whose queue
/// is full misses the frame.
pub struct RealtimeHub {
    /// Map of connection ID -> sender to that socket
    connections: DashMap<Uuid, mpsc::Sender<ServerFrame>>,
    /// Map of room name -> connection IDs in it
    rooms: DashMap<String, HashSet<Uuid>>,
}

impl RealtimeHub {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            rooms: DashMap::new(),
        }
    }

    pub fn register(&self, connection_id: Uuid, sender: mpsc::Sender<ServerFrame>) {
        self.connections.insert(connection_id, sender);
        tracing::debug!("Socket connected: {}", connection_id);
    }

    pub fn unregister(&self, connection_id: &Uuid) {
        self.connections.remove(connection_id);
        for mut members in self.rooms.iter_mut() {
            members.remove(connection_id);
        }
        self.rooms.retain(|_, members| !members.is_empty());
        tracing::debug!("Socket disconnected: {}", connection_id);
    }

    pub fn join(&self, connection_id: Uuid, room: &str) {
        self.rooms
            .entry(room.to_string())
            .or_default()
            .insert(connection_id);
    }

    pub fn leave(&self, connection_id: &Uuid, room: &str) {
        if let Some(mut members) = self.rooms.get_mut(room) {
            members.remove(connection_id);
        }
        self.rooms.remove_if(room, |_, members| members.is_empty());
    }

    pub fn room_size(&self, room: &str) -> usize {
        self.rooms.get(room).map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_member(&self, connection_id: &Uuid, room: &str) -> bool {
        self.rooms
            .get(room)
            .map(|m| m.contains(connection_id))
            .unwrap_or(false)
    }

    pub fn send_to(&self, connection_id: &Uuid, frame: ServerFrame) -> bool {
        let sender = self.connections.get(connection_id).map(|s| s.clone());
        match sender {
            Some(sender) => offer(&sender, frame),
            None => false,
        }
    }

    /// Deliver to every member of `room`; returns how many accepted the frame.
    pub fn emit_to_room(&self, room: &str, frame: ServerFrame) -> usize {
        let senders: Vec<_> = match self.rooms.get(room) {
            Some(members) => members
                .iter()
                .filter_map(|id| self.connections.get(id).map(|s| s.clone()))
                .collect(),
            None => return 0,
        };
        deliver(senders, frame)
    }

    pub fn broadcast(&self, frame: ServerFrame) -> usize {
        let senders: Vec<_> = self.connections.iter().map(|e| e.value().clone()).collect();
        deliver(senders, frame)
    }
}

impl Default for RealtimeHub {
    fn default() -> Self {
        Self::new()
    }
}

fn offer(sender: &mpsc::Sender<ServerFrame>, frame: ServerFrame) -> bool {
    match sender.try_send(frame) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            tracing::debug!("Socket queue full, dropping realtime frame");
            false
        }
        Err(TrySendError::Closed(_)) => {
            tracing::debug!("Socket closed, dropping realtime frame");
            false
        }
    }
}

fn deliver(senders: Vec<mpsc::Sender<ServerFrame>>, frame: ServerFrame) -> usize {
    senders
        .iter()
        .filter(|sender| offer(sender, frame.clone()))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connect(hub: &RealtimeHub) -> (Uuid, mpsc::Receiver<ServerFrame>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(8);
        hub.register(id, tx);
        (id, rx)
    }

    #[tokio::test]
    async fn test_room_emit_reaches_members_only() {
        let hub = RealtimeHub::new();
        let (a, mut rx_a) = connect(&hub);
        let (_b, mut rx_b) = connect(&hub);
        hub.join(a, "task:1");

        let sent = hub.emit_to_room("task:1", ServerFrame::status("hello"));
        assert_eq!(sent, 1);
        assert!(matches!(rx_a.recv().await, Some(ServerFrame::Status { .. })));
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_broadcast_reaches_everyone() {
        let hub = RealtimeHub::new();
        let (_a, mut rx_a) = connect(&hub);
        let (_b, mut rx_b) = connect(&hub);

        let frame = ServerFrame::NewRide {
            data: serde_json::json!({ "origin": "Surrey" }),
        };
        assert_eq!(hub.broadcast(frame), 2);
        assert!(rx_a.recv().await.is_some());
        assert!(rx_b.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_unregister_cleans_rooms() {
        let hub = RealtimeHub::new();
        let (a, rx_a) = connect(&hub);
        hub.join(a, "user:3");
        assert_eq!(hub.room_size("user:3"), 1);

        hub.unregister(&a);
        drop(rx_a);
        assert_eq!(hub.room_size("user:3"), 0);
        assert_eq!(hub.emit_to_room("user:3", ServerFrame::status("x")), 0);
    }

    #[tokio::test]
    async fn test_leave_room() {
        let hub = RealtimeHub::new();
        let (a, _rx) = connect(&hub);
        hub.join(a, "task:2");
        assert!(hub.is_member(&a, "task:2"));
        hub.leave(&a, "task:2");
        assert_eq!(hub.room_size("task:2"), 0);
        assert!(!hub.is_member(&a, "task:2"));
        assert!(!hub.send_to(&Uuid::new_v4(), ServerFrame::status("x")));
    }

    #[test]
    fn test_stalled_connection_does_not_block_delivery() {
        let hub = RealtimeHub::new();
        let stalled = Uuid::new_v4();
        let (tx, _never_read) = mpsc::channel(1);
        hub.register(stalled, tx);
        let (live, mut rx_live) = connect(&hub);
        hub.join(stalled, "user:5");
        hub.join(live, "user:5");

        assert_eq!(hub.emit_to_room("user:5", ServerFrame::status("one")), 2);
        // the stalled queue is full now; the frame is dropped for it only
        assert_eq!(hub.emit_to_room("user:5", ServerFrame::status("two")), 1);
        assert!(rx_live.try_recv().is_ok());
        assert!(rx_live.try_recv().is_ok());
    }
}
