//! The order status state machine.
//!
//! | From \ To        | confirmed | preparing | ready | out_for_delivery | delivered | cancelled |
//! |------------------|-----------|-----------|-------|------------------|-----------|-----------|
//! | pending          | ✓         |           |       |                  |           | ✓         |
//! | confirmed        |           | ✓         |       |                  |           | ✓         |
//! | preparing        |           |           | ✓     |                  |           |           |
//! | ready            |           |           |       | ✓                |           |           |
//! | out_for_delivery |           |           |       |                  | ✓         |           |
//!
//! `delivered` and `cancelled` are terminal. No status may transition to itself.
//!
//! [`Order::apply_transition`] is the only way an order's status, history and derived timestamps change. It works on
//! an in-memory copy; the caller persists the result with a compare-and-swap on the prior status.
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::db_types::{ActorId, Order, OrderStatusType, PaymentStatus, StatusHistoryEntry};

/// Minutes added to the transition time to estimate the delivery time when an order goes out for delivery.
pub const DELIVERY_ESTIMATE_MINUTES: i64 = 30;

pub const ORDER_PLACED_NOTE: &str = "Order placed";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Cannot change order status from {from} to {to}")]
    InvalidTransition { from: OrderStatusType, to: OrderStatusType },
    #[error("Orders that are {0} can no longer be cancelled")]
    NotCancellable(OrderStatusType),
}

/// The statuses that `from` may legally move to.
pub fn allowed_transitions(from: OrderStatusType) -> &'static [OrderStatusType] {
    use OrderStatusType::*;
    match from {
        Pending => &[Confirmed, Cancelled],
        Confirmed => &[Preparing, Cancelled],
        Preparing => &[Ready],
        Ready => &[OutForDelivery],
        OutForDelivery => &[Delivered],
        Delivered | Cancelled => &[],
    }
}

pub fn can_transition(from: OrderStatusType, to: OrderStatusType) -> bool {
    allowed_transitions(from).contains(&to)
}

pub fn is_cancellable(status: OrderStatusType) -> bool {
    matches!(status, OrderStatusType::Pending | OrderStatusType::Confirmed)
}

/// Checks whether `from -> to` is legal. Cancellation is checked first so that callers get the more specific error.
pub fn check_transition(from: OrderStatusType, to: OrderStatusType) -> Result<(), TransitionError> {
    if to == OrderStatusType::Cancelled && !is_cancellable(from) {
        return Err(TransitionError::NotCancellable(from));
    }
    if !can_transition(from, to) {
        return Err(TransitionError::InvalidTransition { from, to });
    }
    Ok(())
}

/// The seed entry written into the history of every new order.
pub fn order_placed_entry(placed_at: DateTime<Utc>, actor: Option<ActorId>) -> StatusHistoryEntry {
    StatusHistoryEntry::new(OrderStatusType::Pending, placed_at)
        .with_actor(actor)
        .with_note(Some(ORDER_PLACED_NOTE.to_string()))
}

/// A summary of the changes a successful transition made to an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRecord {
    pub from: OrderStatusType,
    pub to: OrderStatusType,
    pub entry: StatusHistoryEntry,
    /// The payment status before the transition, used by backends for the compare-and-swap.
    pub payment_status_before: PaymentStatus,
    /// True if the transition also moved the payment status from `paid` to `refunded`.
    pub refunded: bool,
}

impl Order {
    /// Moves the order to `target`, appending one history entry and setting the derived fields for the new status.
    ///
    /// On error the order is left untouched.
    pub fn apply_transition(
        &mut self,
        target: OrderStatusType,
        actor: Option<ActorId>,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<TransitionRecord, TransitionError> {
        let from = self.status;
        check_transition(from, target)?;
        let payment_status_before = self.payment_status;
        let entry = StatusHistoryEntry::new(target, now).with_actor(actor).with_note(note);
        self.status = target;
        self.status_history.push(entry.clone());
        if let Some(slot) = self.timestamps.slot_mut(target) {
            if slot.is_none() {
                *slot = Some(now);
            }
        }
        match target {
            OrderStatusType::OutForDelivery => {
                self.estimated_delivery_time = Some(now + Duration::minutes(DELIVERY_ESTIMATE_MINUTES));
            },
            OrderStatusType::Delivered => {
                self.actual_delivery_time = Some(now);
            },
            _ => {},
        }
        let refunded = target == OrderStatusType::Cancelled && self.payment_status == PaymentStatus::Paid;
        if refunded {
            self.payment_status = PaymentStatus::Refunded;
        }
        self.updated_at = now;
        Ok(TransitionRecord { from, to: target, entry, payment_status_before, refunded })
    }
}
