use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("We have an internal database engine (configuration/uptime etc.) error: {0}")]
    DatabaseError(String),
    #[error("The record was modified by someone else. {0}")]
    ConcurrentModification(String),
    #[error("A stored record failed validation and cannot be used. {0}")]
    CorruptRecord(String),
    #[error("The requested order (internal id {0}) does not exist")]
    OrderNotFound(i64),
    #[error("Coupon {0} does not exist")]
    CouponNotFound(String),
    #[error("A coupon with code {0} already exists")]
    DuplicateCouponCode(String),
    #[error("Coupon {0} has been used and cannot be deleted. Deactivate it instead.")]
    CouponInUse(String),
    #[error("Coupon {0} has reached its usage limit")]
    CouponUsageLimitReached(String),
    #[error("Coupon {0} has reached its per-customer usage limit")]
    CouponCustomerLimitReached(String),
    #[error("Coupon {0} is inactive or outside its validity window")]
    CouponUnavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::DatabaseError(e.to_string())
    }
}
