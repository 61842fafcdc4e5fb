use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Whether a highlight was added to or removed from an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkOperation {
    Mark,
    Unmark,
}

/// Events pushed to connected clients and in-process subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum Notification {
    #[serde(rename = "resource:created")]
    ResourceCreated {
        resource: String,
        #[serde(rename = "_id")]
        id: String,
    },
    #[serde(rename = "resource:updated")]
    ResourceUpdated {
        resource: String,
        #[serde(rename = "_id")]
        id: String,
        /// Changed field names, each mapped to `1`.
        fields: BTreeMap<String, u8>,
    },
    #[serde(rename = "resource:deleted")]
    ResourceDeleted {
        resource: String,
        #[serde(rename = "_id")]
        id: String,
    },
    #[serde(rename = "item:highlights")]
    ItemHighlights {
        /// `1` when marked, `0` when unmarked.
        marked: u8,
        item_id: String,
        mark_id: String,
    },
    /// Activity entry recorded for a highlight toggle.
    #[serde(rename = "item:highlight")]
    ItemHighlightActivity {
        item_id: String,
        highlight_id: String,
        highlight_name: Option<String>,
        operation: MarkOperation,
    },
}

impl Notification {
    pub fn name(&self) -> &'static str {
        match self {
            Notification::ResourceCreated { .. } => "resource:created",
            Notification::ResourceUpdated { .. } => "resource:updated",
            Notification::ResourceDeleted { .. } => "resource:deleted",
            Notification::ItemHighlights { .. } => "item:highlights",
            Notification::ItemHighlightActivity { .. } => "item:highlight",
        }
    }
}

/// Fire-and-forget publisher with any number of subscribers.
#[derive(Clone)]
pub struct NotificationBus {
    sender: broadcast::Sender<Notification>,
}

impl NotificationBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event. Having no subscriber is not an error.
    pub fn publish(&self, notification: Notification) {
        tracing::debug!(event = notification.name(), "push notification");
        let _ = self.sender.send(notification);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

/// Drain everything currently buffered in a receiver.
pub fn drain(receiver: &mut broadcast::Receiver<Notification>) -> Vec<Notification> {
    let mut out = Vec::new();
    while let Ok(notification) = receiver.try_recv() {
        out.push(notification);
    }
    out
}
