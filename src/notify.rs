use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::model::Event;

const CHANNEL_CAPACITY: usize = 256;

/// Broadcast hub for timeline-update signaling, one channel per project.
/// Sends are fire-and-forget: a mutation never fails because nobody (or a
/// slow consumer) is listening.
pub struct NotifyHub {
    channels: DashMap<String, broadcast::Sender<Event>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to a project's timeline updates. Creates the channel if needed.
    pub fn subscribe(&self, project_id: &str) -> broadcast::Receiver<Event> {
        let sender = self
            .channels
            .entry(project_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Send a notification. No-op if nobody is listening.
    pub fn send(&self, project_id: &str, event: &Event) {
        if let Some(sender) = self.channels.get(project_id) {
            let _ = sender.send(event.clone());
        }
    }
}
