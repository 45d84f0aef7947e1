use std::fmt::Display;

use fo_common::Cents;
use food_order_engine::PaymentVerification;
use serde::{Deserialize, Serialize};

pub const CHARGE_SUCCESS_EVENT: &str = "charge.success";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// The body of a payment gateway webhook call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentWebhook {
    pub event: String,
    pub data: PaymentWebhookData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentWebhookData {
    /// The payment reference. It starts with the order number the payment was initialised for.
    pub reference: String,
    /// The amount actually collected, in minor units.
    pub amount: Cents,
    pub status: String,
}

impl PaymentWebhook {
    pub fn reference(&self) -> &str {
        self.data.reference.as_str()
    }

    /// Only a successful charge counts as payment. Every other event is treated as an unpaid attempt.
    pub fn verification(&self) -> PaymentVerification {
        let paid = self.event == CHARGE_SUCCESS_EVENT && self.data.status.eq_ignore_ascii_case("success");
        if paid {
            PaymentVerification::paid(self.data.amount)
        } else {
            PaymentVerification::unpaid(self.data.amount)
        }
    }
}
