use std::time::Duration;

use food_order_engine::{
    notifications::{BroadcastNotificationSink, Notification},
    LoyaltyApi,
    SqliteDatabase,
};
use log::*;
use tokio::{sync::broadcast::error::RecvError, task::JoinHandle};

/// The most outbox entries the loyalty worker credits per sweep.
pub const ACCRUAL_BATCH_SIZE: u32 = 100;

/// Starts the loyalty outbox worker. Accruals are normally credited the moment an order is delivered; this sweep picks
/// up any that were missed because of a crash or a database error. Do not await the returned JoinHandle, as it will
/// run indefinitely.
pub fn start_loyalty_worker(db: SqliteDatabase, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        let api = LoyaltyApi::new(db);
        info!("🎁️ Loyalty outbox worker started");
        loop {
            timer.tick().await;
            trace!("🎁️ Sweeping the loyalty outbox");
            match api.process_pending_accruals(ACCRUAL_BATCH_SIZE).await {
                Ok(0) => trace!("🎁️ No pending accruals"),
                Ok(n) => info!("🎁️ {n} pending loyalty accruals credited"),
                Err(e) => error!("🎁️ Error sweeping the loyalty outbox: {e}"),
            }
        }
    })
}

/// Logs every notification that passes through the broadcast sink. Real-time connections and the mail transport
/// subscribe to the same sink; this gives operators an audit trail of what was sent.
pub fn start_notification_logger(sink: &BroadcastNotificationSink) -> JoinHandle<()> {
    let mut rx = sink.subscribe();
    tokio::spawn(async move {
        info!("📣️ Notification logger started");
        loop {
            match rx.recv().await {
                Ok(Notification::Realtime { topic, payload }) => {
                    debug!("📣️ [{topic}] {payload}");
                },
                Ok(Notification::Email { template, recipient, .. }) => {
                    info!("📣️ Email '{template}' queued for {recipient}");
                },
                Err(RecvError::Lagged(n)) => warn!("📣️ Notification logger fell behind. {n} notifications skipped"),
                Err(RecvError::Closed) => {
                    info!("📣️ Notification sink closed. Logger shutting down");
                    break;
                },
            }
        }
    })
}
