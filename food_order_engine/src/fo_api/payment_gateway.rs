use fo_common::Cents;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::Order;

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("The payment gateway could not be reached. {0}")]
    Unavailable(String),
    #[error("The payment gateway rejected the request. {0}")]
    Rejected(String),
}

/// The gateway's verdict on a payment reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentVerification {
    pub paid: bool,
    pub amount: Cents,
}

impl PaymentVerification {
    pub fn paid(amount: Cents) -> Self {
        Self { paid: true, amount }
    }

    pub fn unpaid(amount: Cents) -> Self {
        Self { paid: false, amount }
    }
}

/// A hosted payment page provider. The order number is used as the payment reference.
#[allow(async_fn_in_trait)]
pub trait PaymentGateway {
    /// Starts a payment for the order and returns the URL to send the customer to.
    async fn initialize(&self, order: &Order) -> Result<String, GatewayError>;

    async fn verify(&self, reference: &str) -> Result<PaymentVerification, GatewayError>;
}
