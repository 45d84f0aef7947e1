use serde::Serialize;

use crate::db_types::{ActorId, Order, OrderStatusType};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderCreatedEvent {
    pub order: Order,
}

impl OrderCreatedEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

/// Emitted after a status transition has been committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusChangedEvent {
    pub order: Order,
    pub old_status: OrderStatusType,
    pub new_status: OrderStatusType,
    pub actor: Option<ActorId>,
    pub note: Option<String>,
}

impl OrderStatusChangedEvent {
    pub fn new(order: Order, old_status: OrderStatusType, actor: Option<ActorId>, note: Option<String>) -> Self {
        let new_status = order.status();
        Self { order, old_status, new_status, actor, note }
    }
}
