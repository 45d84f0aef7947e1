use chrono::{DateTime, Utc};

use crate::{
    db_types::{Coupon, NewCoupon},
    db::traits::StoreError,
};

/// The `CouponManagement` trait defines the behaviour for storing coupons. Usage is recorded by
/// [`crate::OrderManagement::insert_order`], in the same transaction as the order.
#[allow(async_fn_in_trait)]
pub trait CouponManagement: Clone {
    /// Stores a normalised coupon. Fails with [`StoreError::DuplicateCouponCode`] if the code is taken.
    async fn insert_coupon(&self, coupon: NewCoupon, now: DateTime<Utc>) -> Result<Coupon, StoreError>;

    /// Case-insensitive lookup, including the usage history.
    async fn fetch_coupon_by_code(&self, code: &str) -> Result<Option<Coupon>, StoreError>;

    async fn fetch_coupons(&self, active_only: bool) -> Result<Vec<Coupon>, StoreError>;

    async fn set_coupon_active(&self, code: &str, active: bool, now: DateTime<Utc>) -> Result<Coupon, StoreError>;

    /// Deletes a coupon that has never been used. Used coupons fail with [`StoreError::CouponInUse`].
    async fn delete_coupon(&self, code: &str) -> Result<(), StoreError>;
}
