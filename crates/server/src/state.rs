use crate::{config::Config, db::Database, mailer::Mailer, realtime::RealtimeHub};
use shared::ServerFrame;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Config,
    pub mailer: Mailer,
    /// `None` when realtime notifications are switched off
    pub hub: Option<Arc<RealtimeHub>>,
}

impl AppState {
    pub fn new(db: Database, config: Config) -> Self {
        let hub = if config.realtime.enabled {
            Some(Arc::new(RealtimeHub::new()))
        } else {
            tracing::warn!("Realtime notifications disabled; the HTTP API runs without them");
            None
        };

        Self {
            db,
            mailer: Mailer::new(config.smtp.clone()),
            config,
            hub,
        }
    }

    pub fn notify_room(&self, room: &str, frame: ServerFrame) {
        if let Some(hub) = &self.hub {
            let delivered = hub.emit_to_room(room, frame);
            tracing::debug!(room, delivered, "Realtime frame emitted");
        }
    }

    pub fn notify_all(&self, frame: ServerFrame) {
        if let Some(hub) = &self.hub {
            let delivered = hub.broadcast(frame);
            tracing::debug!(delivered, "Realtime frame broadcast");
        }
    }
}
