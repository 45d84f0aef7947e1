use std::future::Future;

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotificationError {
    #[error("Notification was not delivered within {0}ms")]
    Timeout(u64),
    #[error("Notification was rejected: {0}")]
    Rejected(String),
}

/// The outbound side of the notification system: real-time pub-sub and transactional email.
pub trait NotificationSink: Clone + Send + Sync + 'static {
    /// Pushes `payload` to every subscriber of `topic`.
    fn publish(&self, topic: &str, payload: Value) -> impl Future<Output = Result<(), NotificationError>> + Send;

    /// Sends the email `template` to `recipient`, rendered with `data`.
    fn send_transactional_email(
        &self,
        template: &str,
        recipient: &str,
        data: Value,
    ) -> impl Future<Output = Result<(), NotificationError>> + Send;
}
