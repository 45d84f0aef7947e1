use chrono::{DateTime, Utc};

use crate::{
    db_types::{CustomerId, Order, OrderDraft, OrderNumber, PaymentStatus, StatusHistoryEntry},
    order_lifecycle::TransitionRecord,
    order_objects::OrderQueryFilter,
    db::traits::StoreError,
};

/// The `OrderManagement` trait defines the behaviour for storing and querying orders in the database backend.
#[allow(async_fn_in_trait)]
pub trait OrderManagement: Clone {
    /// Stores a new order in a single atomic transaction:
    /// * the next order number is taken from the order counter,
    /// * the order, its line items and its seed history entry are inserted,
    /// * the coupon usage, if any, is recorded. The coupon's availability and usage limits are checked again inside the
    ///   transaction. [`StoreError::CouponUsageLimitReached`] or [`StoreError::CouponCustomerLimitReached`] is returned
    ///   if another order claimed the last use first, and [`StoreError::CouponUnavailable`] if the coupon was
    ///   deactivated or expired in the meantime.
    async fn insert_order(&self, draft: OrderDraft) -> Result<Order, StoreError>;

    async fn fetch_order_by_id(&self, id: i64) -> Result<Option<Order>, StoreError>;

    async fn fetch_order_by_number(&self, number: &OrderNumber) -> Result<Option<Order>, StoreError>;

    /// Fetches orders matching the filter, oldest first.
    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, StoreError>;

    async fn fetch_status_history(&self, order_id: i64) -> Result<Vec<StatusHistoryEntry>, StoreError>;

    /// The number of orders the customer has placed that were not cancelled.
    async fn count_orders_for_customer(&self, customer_id: &CustomerId) -> Result<u64, StoreError>;

    /// Persists an order that has just had [`Order::apply_transition`] applied to it.
    ///
    /// The write only succeeds if the stored status is still `record.from`. Otherwise the call fails with
    /// [`StoreError::ConcurrentModification`] and nothing is written. In the same transaction, the history entry
    /// is appended, and for delivered orders of registered customers a loyalty accrual is queued in the outbox.
    async fn commit_transition(&self, order: &Order, record: &TransitionRecord) -> Result<(), StoreError>;

    /// Changes the payment status of an order from `expected` to `new`. Fails with
    /// [`StoreError::ConcurrentModification`] if the stored payment status is no longer `expected`.
    async fn update_payment_status(
        &self,
        order_id: i64,
        expected: PaymentStatus,
        new: PaymentStatus,
        now: DateTime<Utc>,
    ) -> Result<Order, StoreError>;
}
