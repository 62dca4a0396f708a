use dashmap::DashMap;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::model::Event;

const CHANNEL_CAPACITY: usize = 256;

/// One change notification, ready for a LISTEN subscriber: the affected
/// resource and the event as a JSON payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub resource_id: Ulid,
    pub payload: String,
}

/// Broadcast hub for per-resource change notifications. Front-desk calendar
/// views subscribe to the units they display and refetch on delivery.
pub struct NotifyHub {
    channels: DashMap<Ulid, broadcast::Sender<Notification>>,
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

    /// Subscribe to notifications for a resource. Creates the channel if needed.
    pub fn subscribe(&self, resource_id: Ulid) -> broadcast::Receiver<Notification> {
        let sender = self
            .channels
            .entry(resource_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Send a notification. No-op if nobody is listening.
    pub fn send(&self, resource_id: Ulid, event: &Event) {
        if let Some(sender) = self.channels.get(&resource_id) {
            if let Ok(payload) = serde_json::to_string(event) {
                let _ = sender.send(Notification {
                    resource_id,
                    payload,
                });
            }
        }
    }

    /// Remove a channel (e.g. when a resource is deleted).
    pub fn remove(&self, resource_id: &Ulid) {
        self.channels.remove(resource_id);
    }
}
