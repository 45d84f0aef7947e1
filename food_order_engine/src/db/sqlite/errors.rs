use thiserror::Error;

use crate::{db_types::ConversionError, StoreError};

#[derive(Debug, Error)]
pub enum SqliteDatabaseError {
    #[error("Database connection error: {0}")]
    DriverError(#[from] sqlx::Error),
    #[error("Database migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),
    #[error("Corrupt record: {0}")]
    CorruptRecord(String),
    #[error("Concurrent modification: {0}")]
    ConcurrentModification(String),
    #[error("Order #{0} does not exist")]
    OrderNotFound(i64),
    #[error("Coupon {0} does not exist")]
    CouponNotFound(String),
    #[error("Coupon {0} already exists")]
    DuplicateCouponCode(String),
    #[error("Coupon {0} has been used")]
    CouponInUse(String),
    #[error("Coupon {0} has reached its usage limit")]
    CouponUsageLimitReached(String),
    #[error("Coupon {0} has reached its per-customer usage limit")]
    CouponCustomerLimitReached(String),
    #[error("Coupon {0} is inactive or outside its validity window")]
    CouponUnavailable(String),
}

impl From<ConversionError> for SqliteDatabaseError {
    fn from(e: ConversionError) -> Self {
        SqliteDatabaseError::CorruptRecord(e.to_string())
    }
}

impl From<SqliteDatabaseError> for StoreError {
    fn from(e: SqliteDatabaseError) -> Self {
        use SqliteDatabaseError::*;
        match e {
            DriverError(e) => StoreError::DatabaseError(e.to_string()),
            MigrationError(e) => StoreError::DatabaseError(e.to_string()),
            CorruptRecord(s) => StoreError::CorruptRecord(s),
            ConcurrentModification(s) => StoreError::ConcurrentModification(s),
            OrderNotFound(id) => StoreError::OrderNotFound(id),
            CouponNotFound(code) => StoreError::CouponNotFound(code),
            DuplicateCouponCode(code) => StoreError::DuplicateCouponCode(code),
            CouponInUse(code) => StoreError::CouponInUse(code),
            CouponUsageLimitReached(code) => StoreError::CouponUsageLimitReached(code),
            CouponCustomerLimitReached(code) => StoreError::CouponCustomerLimitReached(code),
            CouponUnavailable(code) => StoreError::CouponUnavailable(code),
        }
    }
}
