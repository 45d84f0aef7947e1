use std::{fmt::Debug, sync::Arc};

use log::*;

use crate::{
    db_types::{
        ActorId,
        NewOrder,
        Order,
        OrderDraft,
        OrderNumber,
        OrderStatusType,
        PaymentMethod,
        PaymentStatus,
        StatusHistoryEntry,
    },
    events::{EventProducers, OrderCreatedEvent, OrderStatusChangedEvent},
    fo_api::coupon_api::evaluate_coupon,
    helpers::{extract_order_number_from_reference, Clock, SystemClock},
    order_objects::OrderQueryFilter,
    CouponManagement,
    LoyaltyApi,
    LoyaltyManagement,
    OrderFlowError,
    OrderManagement,
    PaymentGateway,
    PaymentVerification,
};

/// The note attached to the history entry when a payment confirms an order.
pub const PAYMENT_CONFIRMED_NOTE: &str = "Payment confirmed";
/// Paid amounts within this many cents of the order total are accepted.
pub const PAYMENT_TOLERANCE_CENTS: i64 = 1;

/// `OrderFlowApi` is the primary API for placing orders and moving them through the fulfilment pipeline.
///
/// Every mutation is persisted first and announced afterwards. Events are published without waiting, so a slow
/// notification channel can never hold up an order.
#[derive(Clone)]
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
    clock: Arc<dyn Clock>,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers, clock: Arc::new(SystemClock) }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> OrderFlowApi<B>
where B: OrderManagement + CouponManagement + LoyaltyManagement
{
    /// Places a new order in the `pending` state.
    ///
    /// The request is validated and the coupon, if any, is evaluated against the basket. The order number, the order
    /// with its items and seed history entry, and the coupon usage are then written in one transaction.
    pub async fn create_order(&self, order: NewOrder) -> Result<Order, OrderFlowError> {
        order.validate().map_err(OrderFlowError::InvalidOrder)?;
        let now = self.clock.now();
        let subtotal = order.subtotal();
        let code = order.coupon_code.as_deref().map(str::trim).filter(|c| !c.is_empty());
        let coupon = match code {
            Some(code) => {
                Some(evaluate_coupon(&self.db, code, subtotal, &order.items, order.customer_id.as_ref(), now).await?)
            },
            None => None,
        };
        let discount = coupon.as_ref().map(|c| c.discount).unwrap_or_default();
        let draft = OrderDraft {
            customer_id: order.customer_id,
            customer_info: order.customer_info,
            items: order.items,
            payment_method: order.payment_method,
            subtotal,
            discount,
            total_amount: subtotal - discount,
            coupon,
            placed_at: now,
        };
        let order = self.db.insert_order(draft).await?;
        info!("🔄️📦️ Order {} placed for {}", order.order_number, order.total_amount);
        self.call_order_created_hook(&order);
        Ok(order)
    }

    fn call_order_created_hook(&self, order: &Order) {
        for emitter in &self.producers.order_created_producer {
            trace!("🔄️📦️ Notifying order created hook subscribers");
            emitter.try_publish_event(OrderCreatedEvent::new(order.clone()));
        }
    }

    fn call_status_changed_hook(
        &self,
        order: &Order,
        old_status: OrderStatusType,
        actor: Option<ActorId>,
        note: Option<String>,
    ) {
        for emitter in &self.producers.status_changed_producer {
            trace!("🔄️🚦️ Notifying status changed hook subscribers");
            let event = OrderStatusChangedEvent::new(order.clone(), old_status, actor.clone(), note.clone());
            emitter.try_publish_event(event);
        }
    }

    /// Moves an order to `target`.
    ///
    /// The legal moves are
    ///
    /// | From             | To                        |
    /// |------------------|---------------------------|
    /// | pending          | confirmed, cancelled      |
    /// | confirmed        | preparing, cancelled      |
    /// | preparing        | ready                     |
    /// | ready            | out_for_delivery          |
    /// | out_for_delivery | delivered                 |
    ///
    /// Anything else is rejected and the order is left as it was. Cancelling an order that has already gone to the
    /// kitchen fails with [`OrderFlowError::NotCancellable`].
    ///
    /// The change is saved with a check that nobody else moved the order in the meantime. If they did, the call fails
    /// with [`OrderFlowError::ConcurrentModification`].
    ///
    /// Once an order is delivered, the loyalty points it earned are credited straight away. If that fails the
    /// accrual stays queued and the background worker picks it up.
    pub async fn transition_order(
        &self,
        order_id: i64,
        target: OrderStatusType,
        actor: Option<ActorId>,
        note: Option<String>,
    ) -> Result<Order, OrderFlowError> {
        let mut order = self.fetch_existing_order(order_id).await?;
        let record = order.apply_transition(target, actor.clone(), note.clone(), self.clock.now())?;
        self.db.commit_transition(&order, &record).await?;
        info!("🔄️🚦️ Order {} moved from {} to {}", order.order_number, record.from, record.to);
        if record.refunded {
            info!("🔄️💰️ Payment for cancelled order {} marked as refunded", order.order_number);
        }
        if target == OrderStatusType::Delivered && order.customer_id.is_some() {
            self.apply_loyalty_accrual(order.id).await;
        }
        self.call_status_changed_hook(&order, record.from, actor, note);
        Ok(order)
    }

    /// Cancels an order that has not gone to the kitchen yet.
    pub async fn cancel_order(
        &self,
        order_id: i64,
        actor: Option<ActorId>,
        reason: Option<String>,
    ) -> Result<Order, OrderFlowError> {
        self.transition_order(order_id, OrderStatusType::Cancelled, actor, reason).await
    }

    async fn apply_loyalty_accrual(&self, order_id: i64) {
        let loyalty = LoyaltyApi::new(self.db.clone()).with_clock(self.clock.clone());
        if let Err(e) = loyalty.process_accruals_for_order(order_id).await {
            warn!("🔄️🎁️ Loyalty accrual for order #{order_id} will be retried later. {e}");
        }
    }

    /// Starts a gateway payment for the order and returns the URL to redirect the customer to.
    pub async fn initialize_payment<G: PaymentGateway>(
        &self,
        gateway: &G,
        order_id: i64,
    ) -> Result<String, OrderFlowError> {
        let order = self.fetch_existing_order(order_id).await?;
        if order.payment_method == PaymentMethod::Cash {
            return Err(OrderFlowError::PaymentNotApplicable(format!(
                "Order {} is paid in cash on delivery",
                order.order_number
            )));
        }
        if order.payment_status != PaymentStatus::Pending {
            return Err(OrderFlowError::PaymentNotApplicable(format!(
                "Payment for order {} is {}",
                order.order_number, order.payment_status
            )));
        }
        if order.status().is_terminal() {
            return Err(OrderFlowError::PaymentNotApplicable(format!(
                "Order {} is {}",
                order.order_number,
                order.status()
            )));
        }
        let url = gateway.initialize(&order).await?;
        debug!("🔄️💰️ Payment initialised for order {}", order.order_number);
        Ok(url)
    }

    /// Asks the gateway about the payment and applies the answer to the order.
    pub async fn verify_payment<G: PaymentGateway>(&self, gateway: &G, reference: &str) -> Result<Order, OrderFlowError> {
        let verification = gateway.verify(reference).await?;
        self.apply_payment_result(reference, verification).await
    }

    /// Records the outcome of a payment against the order named in `reference`.
    ///
    /// A successful payment for the full amount (to within one cent) marks the order paid and, if it is still
    /// pending, confirms it. Otherwise the payment is marked failed and an error is returned. Results for orders that
    /// are already settled are ignored, so gateway retries are harmless.
    pub async fn apply_payment_result(
        &self,
        reference: &str,
        verification: PaymentVerification,
    ) -> Result<Order, OrderFlowError> {
        let number = extract_order_number_from_reference(reference)
            .ok_or_else(|| OrderFlowError::OrderNotFound(reference.to_string()))?;
        let mut order = self.fetch_existing_order_by_number(&number).await?;
        if matches!(order.payment_status, PaymentStatus::Paid | PaymentStatus::Refunded) {
            debug!("🔄️💰️ Payment for order {number} is already {}. Nothing to do", order.payment_status);
            return Ok(order);
        }
        let now = self.clock.now();
        if !verification.paid {
            self.db.update_payment_status(order.id, order.payment_status, PaymentStatus::Failed, now).await?;
            warn!("🔄️💰️ Payment for order {number} was not completed");
            return Err(OrderFlowError::PaymentNotCompleted(number.to_string()));
        }
        if (verification.amount - order.total_amount).value().abs() > PAYMENT_TOLERANCE_CENTS {
            self.db.update_payment_status(order.id, order.payment_status, PaymentStatus::Failed, now).await?;
            warn!(
                "🔄️💰️ Payment for order {number} was {}, but the order total is {}",
                verification.amount, order.total_amount
            );
            return Err(OrderFlowError::PaymentAmountMismatch {
                expected: order.total_amount,
                received: verification.amount,
            });
        }
        if order.status() != OrderStatusType::Pending {
            if order.status() == OrderStatusType::Cancelled {
                warn!("🔄️💰️ Payment received for cancelled order {number}. It will need to be refunded by hand");
            }
            let order = self.db.update_payment_status(order.id, order.payment_status, PaymentStatus::Paid, now).await?;
            info!("🔄️💰️ Order {number} is paid");
            return Ok(order);
        }
        let note = Some(PAYMENT_CONFIRMED_NOTE.to_string());
        let record = order.apply_transition(OrderStatusType::Confirmed, None, note.clone(), now)?;
        order.payment_status = PaymentStatus::Paid;
        self.db.commit_transition(&order, &record).await?;
        info!("🔄️💰️ Order {number} is paid and confirmed");
        self.call_status_changed_hook(&order, record.from, None, note);
        Ok(order)
    }

    pub async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, OrderFlowError> {
        let order = self.db.fetch_order_by_id(order_id).await?;
        Ok(order)
    }

    pub async fn fetch_order_by_number(&self, number: &OrderNumber) -> Result<Option<Order>, OrderFlowError> {
        let order = self.db.fetch_order_by_number(number).await?;
        Ok(order)
    }

    pub async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderFlowError> {
        let orders = self.db.search_orders(query).await?;
        Ok(orders)
    }

    pub async fn status_history(&self, order_id: i64) -> Result<Vec<StatusHistoryEntry>, OrderFlowError> {
        let _ = self.fetch_existing_order(order_id).await?;
        let history = self.db.fetch_status_history(order_id).await?;
        Ok(history)
    }

    async fn fetch_existing_order(&self, order_id: i64) -> Result<Order, OrderFlowError> {
        self.db.fetch_order_by_id(order_id).await?.ok_or_else(|| OrderFlowError::OrderNotFound(format!("#{order_id}")))
    }

    async fn fetch_existing_order_by_number(&self, number: &OrderNumber) -> Result<Order, OrderFlowError> {
        self.db.fetch_order_by_number(number).await?.ok_or_else(|| OrderFlowError::OrderNotFound(number.to_string()))
    }
}
