use log::*;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::notifications::{NotificationError, NotificationSink};

/// Everything the broadcast sink sends out.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    Realtime { topic: String, payload: Value },
    Email { template: String, recipient: String, data: Value },
}

impl Notification {
    pub fn topic(&self) -> Option<&str> {
        match self {
            Notification::Realtime { topic, .. } => Some(topic.as_str()),
            Notification::Email { .. } => None,
        }
    }
}

/// An in-process sink. Real-time connections and the email worker subscribe to the same broadcast channel and pick
/// out the notifications they care about.
#[derive(Debug, Clone)]
pub struct BroadcastNotificationSink {
    sender: broadcast::Sender<Notification>,
}

impl BroadcastNotificationSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    fn send(&self, notification: Notification) -> Result<(), NotificationError> {
        match self.sender.send(notification) {
            Ok(n) => {
                trace!("📣️ Notification delivered to {n} subscribers");
                Ok(())
            },
            // Nobody is listening. Not an error for a best-effort channel.
            Err(_) => {
                trace!("📣️ Notification dropped. There are no subscribers");
                Ok(())
            },
        }
    }
}

impl NotificationSink for BroadcastNotificationSink {
    async fn publish(&self, topic: &str, payload: Value) -> Result<(), NotificationError> {
        self.send(Notification::Realtime { topic: topic.to_string(), payload })
    }

    async fn send_transactional_email(&self, template: &str, recipient: &str, data: Value) -> Result<(), NotificationError> {
        if !recipient.contains('@') {
            return Err(NotificationError::Rejected(format!("{recipient} is not an email address")));
        }
        self.send(Notification::Email { template: template.to_string(), recipient: recipient.to_string(), data })
    }
}
