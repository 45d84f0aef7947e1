use std::{future::Future, pin::Pin, time::Duration};

use log::*;
use serde_json::json;
#[cfg(test)]
use serde_json::Value;

use crate::{
    events::{EventHooks, OrderCreatedEvent, OrderStatusChangedEvent},
    notifications::{NotificationError, NotificationSink},
};

pub const ADMIN_ROOM: &str = "admin-room";
pub const ORDER_CONFIRMATION_TEMPLATE: &str = "order-confirmation";
pub const STATUS_UPDATE_TEMPLATE: &str = "order-status-update";

/// Turns order events into real-time messages and emails. Every sink call is bounded by `timeout`.
#[derive(Debug, Clone)]
pub struct NotificationFanout<S> {
    sink: S,
    timeout: Duration,
}

impl<S: NotificationSink> NotificationFanout<S> {
    pub fn new(sink: S, timeout: Duration) -> Self {
        Self { sink, timeout }
    }

    /// Event hooks that route order events through this fan-out.
    pub fn hooks(&self) -> EventHooks {
        let mut hooks = EventHooks::default();
        let on_created = self.clone();
        let on_changed = self.clone();
        hooks
            .on_order_created(move |ev| {
                let fanout = on_created.clone();
                Box::pin(async move { fanout.order_created(ev).await }) as Pin<Box<dyn Future<Output = ()> + Send>>
            })
            .on_order_status_changed(move |ev| {
                let fanout = on_changed.clone();
                Box::pin(async move { fanout.status_changed(ev).await }) as Pin<Box<dyn Future<Output = ()> + Send>>
            });
        hooks
    }

    pub async fn order_created(&self, ev: OrderCreatedEvent) {
        let order = &ev.order;
        let payload = json!({
            "type": "new-order",
            "orderId": order.id,
            "orderNumber": order.order_number,
            "totalAmount": order.total_amount,
            "customerName": order.customer_info.name,
        });
        self.deliver(ADMIN_ROOM, self.sink.publish(ADMIN_ROOM, payload)).await;
        let data = json!({
            "orderNumber": order.order_number,
            "customerName": order.customer_info.name,
            "items": order.items,
            "subtotal": order.subtotal,
            "discount": order.discount,
            "totalAmount": order.total_amount,
            "paymentMethod": order.payment_method,
        });
        let email = self.sink.send_transactional_email(ORDER_CONFIRMATION_TEMPLATE, &order.customer_info.email, data);
        self.deliver(ORDER_CONFIRMATION_TEMPLATE, email).await;
    }

    pub async fn status_changed(&self, ev: OrderStatusChangedEvent) {
        let order = &ev.order;
        let timestamp = order.status_history().last().map(|e| e.timestamp).unwrap_or(order.updated_at);
        let payload = json!({
            "type": "order-status-changed",
            "orderId": order.id,
            "orderNumber": order.order_number,
            "oldStatus": ev.old_status,
            "status": ev.new_status,
            "note": ev.note,
            "timestamp": timestamp,
            "estimatedDeliveryTime": order.estimated_delivery_time(),
        });
        let topic = order.tracking_topic();
        self.deliver(&topic, self.sink.publish(&topic, payload.clone())).await;
        self.deliver(ADMIN_ROOM, self.sink.publish(ADMIN_ROOM, payload)).await;
        let data = json!({
            "orderNumber": order.order_number,
            "customerName": order.customer_info.name,
            "status": ev.new_status,
            "note": ev.note,
            "estimatedDeliveryTime": order.estimated_delivery_time(),
        });
        let email = self.sink.send_transactional_email(STATUS_UPDATE_TEMPLATE, &order.customer_info.email, data);
        self.deliver(STATUS_UPDATE_TEMPLATE, email).await;
    }

    async fn deliver<F>(&self, destination: &str, send: F)
    where F: Future<Output = Result<(), NotificationError>> {
        let result = match tokio::time::timeout(self.timeout, send).await {
            Ok(result) => result,
            Err(_) => Err(NotificationError::Timeout(self.timeout.as_millis() as u64)),
        };
        match result {
            Ok(()) => trace!("📣️ Notification sent to {destination}"),
            Err(e) => warn!("📣️ Could not notify {destination}. {e}"),
        }
    }
}
