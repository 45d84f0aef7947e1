use fo_common::Cents;
use thiserror::Error;

use crate::{
    coupons::CouponRejection,
    db::traits::StoreError,
    db_types::OrderStatusType,
    fo_api::payment_gateway::GatewayError,
    loyalty::LedgerError,
    order_lifecycle::TransitionError,
};

#[derive(Debug, Clone, Error)]
pub enum OrderFlowError {
    #[error("Cannot move an order from {from} to {to}")]
    InvalidTransition { from: OrderStatusType, to: OrderStatusType },
    #[error("An order that is {0} can no longer be cancelled")]
    NotCancellable(OrderStatusType),
    #[error("The order was modified by someone else. Reload it and try again. {0}")]
    ConcurrentModification(String),
    #[error("Order {0} does not exist")]
    OrderNotFound(String),
    #[error("Invalid order. {0}")]
    InvalidOrder(String),
    #[error(transparent)]
    Coupon(#[from] CouponError),
    #[error("Payment amount {received} does not match the order total of {expected}")]
    PaymentAmountMismatch { expected: Cents, received: Cents },
    #[error("Payment for order {0} was not completed")]
    PaymentNotCompleted(String),
    #[error("Payment cannot be taken for this order. {0}")]
    PaymentNotApplicable(String),
    #[error("Payment gateway error. {0}")]
    GatewayError(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl OrderFlowError {
    /// A stable identifier for the error, suitable for API clients to match on.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidTransition { .. } => "InvalidTransition",
            Self::NotCancellable(_) => "NotCancellable",
            Self::ConcurrentModification(_) => "ConcurrentModification",
            Self::OrderNotFound(_) => "OrderNotFound",
            Self::InvalidOrder(_) => "InvalidOrder",
            Self::Coupon(e) => e.kind(),
            Self::PaymentAmountMismatch { .. } => "PaymentAmountMismatch",
            Self::PaymentNotCompleted(_) => "PaymentNotCompleted",
            Self::PaymentNotApplicable(_) => "PaymentNotApplicable",
            Self::GatewayError(_) => "GatewayError",
            Self::DatabaseError(_) => "DatabaseError",
        }
    }
}

impl From<StoreError> for OrderFlowError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::ConcurrentModification(s) => Self::ConcurrentModification(s),
            StoreError::OrderNotFound(id) => Self::OrderNotFound(format!("#{id}")),
            StoreError::CouponNotFound(_) |
            StoreError::DuplicateCouponCode(_) |
            StoreError::CouponInUse(_) |
            StoreError::CouponUsageLimitReached(_) |
            StoreError::CouponCustomerLimitReached(_) |
            StoreError::CouponUnavailable(_) => Self::Coupon(CouponError::from(e)),
            StoreError::DatabaseError(s) | StoreError::CorruptRecord(s) => Self::DatabaseError(s),
        }
    }
}

impl From<TransitionError> for OrderFlowError {
    fn from(e: TransitionError) -> Self {
        match e {
            TransitionError::InvalidTransition { from, to } => Self::InvalidTransition { from, to },
            TransitionError::NotCancellable(from) => Self::NotCancellable(from),
        }
    }
}

impl From<GatewayError> for OrderFlowError {
    fn from(e: GatewayError) -> Self {
        Self::GatewayError(e.to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum LoyaltyError {
    #[error("Insufficient points. {available} available, but {requested} requested")]
    InsufficientPoints { available: i64, requested: i64 },
    #[error("At least {minimum} points are required for a redemption, but only {points} were offered")]
    BelowMinimumRedemption { points: i64, minimum: i64 },
    #[error("Invalid points amount. {0}")]
    InvalidAmount(String),
    #[error("The loyalty account was modified by someone else. {0}")]
    ConcurrentModification(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl LoyaltyError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InsufficientPoints { .. } => "InsufficientPoints",
            Self::BelowMinimumRedemption { .. } => "BelowMinimumRedemption",
            Self::InvalidAmount(_) => "InvalidAmount",
            Self::ConcurrentModification(_) => "ConcurrentModification",
            Self::DatabaseError(_) => "DatabaseError",
        }
    }
}

impl From<LedgerError> for LoyaltyError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::InvalidAmount(s) => Self::InvalidAmount(s),
            LedgerError::InsufficientPoints { available, requested } => Self::InsufficientPoints { available, requested },
            LedgerError::BelowMinimumRedemption { points, minimum } => Self::BelowMinimumRedemption { points, minimum },
        }
    }
}

impl From<StoreError> for LoyaltyError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::ConcurrentModification(s) => Self::ConcurrentModification(s),
            other => Self::DatabaseError(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum CouponError {
    #[error("Coupon is not valid. {0}")]
    CouponInvalid(String),
    #[error("Coupon cannot be used. {0}")]
    CouponNotEligible(String),
    #[error("Coupon {0} does not exist")]
    CouponNotFound(String),
    #[error("Coupon {0} has been used and cannot be deleted. Deactivate it instead.")]
    CouponInUse(String),
    #[error("Invalid coupon definition. {0}")]
    InvalidCoupon(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl CouponError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CouponInvalid(_) => "CouponInvalid",
            Self::CouponNotEligible(_) => "CouponNotEligible",
            Self::CouponNotFound(_) => "CouponNotFound",
            Self::CouponInUse(_) => "CouponInUse",
            Self::InvalidCoupon(_) => "InvalidCoupon",
            Self::DatabaseError(_) => "DatabaseError",
        }
    }
}

impl From<CouponRejection> for CouponError {
    fn from(e: CouponRejection) -> Self {
        match e {
            CouponRejection::Invalid(s) => Self::CouponInvalid(s),
            CouponRejection::NotEligible(s) => Self::CouponNotEligible(s),
        }
    }
}

impl From<StoreError> for CouponError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::CouponNotFound(code) => Self::CouponNotFound(code),
            StoreError::CouponInUse(code) => Self::CouponInUse(code),
            StoreError::DuplicateCouponCode(code) => Self::InvalidCoupon(format!("A coupon with code {code} already exists")),
            StoreError::CouponUsageLimitReached(_) => Self::CouponInvalid("Coupon usage limit has been reached".into()),
            StoreError::CouponCustomerLimitReached(_) => {
                Self::CouponNotEligible("You have already used this coupon the maximum number of times".into())
            },
            StoreError::CouponUnavailable(_) => Self::CouponInvalid("Coupon is no longer active".into()),
            other => Self::DatabaseError(other.to_string()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn kinds_are_stable() {
        let err = OrderFlowError::from(TransitionError::NotCancellable(OrderStatusType::Preparing));
        assert_eq!(err.kind(), "NotCancellable");
        assert_eq!(err.to_string(), "An order that is preparing can no longer be cancelled");
        let err = OrderFlowError::from(StoreError::CouponUsageLimitReached("SAVE20".into()));
        assert_eq!(err.kind(), "CouponInvalid");
        let err = OrderFlowError::from(StoreError::CouponCustomerLimitReached("SAVE20".into()));
        assert_eq!(err.kind(), "CouponNotEligible");
        assert_eq!(err.to_string(), "Coupon cannot be used. You have already used this coupon the maximum number of times");
        let err = OrderFlowError::from(StoreError::CouponUnavailable("SAVE20".into()));
        assert_eq!(err.kind(), "CouponInvalid");
        let err = OrderFlowError::from(StoreError::OrderNotFound(42));
        assert_eq!(err.kind(), "OrderNotFound");
        let err = LoyaltyError::from(LedgerError::BelowMinimumRedemption { points: 50, minimum: 100 });
        assert_eq!(err.kind(), "BelowMinimumRedemption");
        let err = CouponError::from(CouponRejection::NotEligible("No eligible items for this coupon".into()));
        assert_eq!(err.kind(), "CouponNotEligible");
        assert_eq!(err.to_string(), "Coupon cannot be used. No eligible items for this coupon");
    }
}
