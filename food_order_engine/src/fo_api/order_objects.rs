use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fo_common::Cents;

use crate::db_types::{CustomerId, OrderStatusType, PaymentStatus};

/// Search criteria for orders. Empty criteria match every order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderQueryFilter {
    pub customer_id: Option<CustomerId>,
    #[serde(default)]
    pub statuses: Vec<OrderStatusType>,
    pub payment_status: Option<PaymentStatus>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
}

impl OrderQueryFilter {
    pub fn with_customer_id<C: Into<CustomerId>>(mut self, customer_id: C) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }

    pub fn with_status(mut self, status: OrderStatusType) -> Self {
        self.statuses.push(status);
        self
    }

    pub fn with_payment_status(mut self, status: PaymentStatus) -> Self {
        self.payment_status = Some(status);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.customer_id.is_none() &&
            self.statuses.is_empty() &&
            self.payment_status.is_none() &&
            self.since.is_none() &&
            self.until.is_none()
    }
}

/// The answer to a checkout-time coupon check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouponValidation {
    pub code: String,
    pub discount: Cents,
    pub message: String,
}
