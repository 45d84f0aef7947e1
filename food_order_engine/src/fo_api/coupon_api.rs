use std::{fmt::Debug, sync::Arc};

use chrono::{DateTime, Utc};
use fo_common::Cents;
use log::*;

use crate::{
    coupons,
    db_types::{AppliedCoupon, Coupon, CustomerId, LineItem, NewCoupon},
    helpers::{Clock, SystemClock},
    order_objects::CouponValidation,
    CouponError,
    CouponManagement,
    OrderManagement,
};

/// `CouponApi` manages the coupon catalogue and answers checkout-time coupon questions.
pub struct CouponApi<B> {
    db: B,
    clock: Arc<dyn Clock>,
}

impl<B> Debug for CouponApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CouponApi")
    }
}

impl<B> CouponApi<B> {
    pub fn new(db: B) -> Self {
        Self { db, clock: Arc::new(SystemClock) }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

impl<B> CouponApi<B>
where B: CouponManagement
{
    pub async fn create_coupon(&self, coupon: NewCoupon) -> Result<Coupon, CouponError> {
        let coupon = coupon.normalize().map_err(CouponError::InvalidCoupon)?;
        let coupon = self.db.insert_coupon(coupon, self.clock.now()).await?;
        info!("🎟️ Coupon {} created", coupon.code);
        Ok(coupon)
    }

    pub async fn fetch_coupon(&self, code: &str) -> Result<Option<Coupon>, CouponError> {
        let coupon = self.db.fetch_coupon_by_code(code).await?;
        Ok(coupon)
    }

    pub async fn list_coupons(&self, active_only: bool) -> Result<Vec<Coupon>, CouponError> {
        let coupons = self.db.fetch_coupons(active_only).await?;
        Ok(coupons)
    }

    pub async fn activate_coupon(&self, code: &str) -> Result<Coupon, CouponError> {
        let coupon = self.db.set_coupon_active(code, true, self.clock.now()).await?;
        info!("🎟️ Coupon {} activated", coupon.code);
        Ok(coupon)
    }

    pub async fn deactivate_coupon(&self, code: &str) -> Result<Coupon, CouponError> {
        let coupon = self.db.set_coupon_active(code, false, self.clock.now()).await?;
        info!("🎟️ Coupon {} deactivated", coupon.code);
        Ok(coupon)
    }

    /// Deletes a coupon. Coupons that have been used cannot be deleted; deactivate them instead.
    pub async fn delete_coupon(&self, code: &str) -> Result<(), CouponError> {
        self.db.delete_coupon(code).await?;
        info!("🎟️ Coupon {code} deleted");
        Ok(())
    }
}

impl<B> CouponApi<B>
where B: CouponManagement + OrderManagement
{
    /// Checks whether the coupon can be applied to a basket, and what it would be worth.
    pub async fn validate_coupon(
        &self,
        code: &str,
        order_amount: Cents,
        items: &[LineItem],
        customer_id: Option<&CustomerId>,
    ) -> Result<CouponValidation, CouponError> {
        let applied = evaluate_coupon(&self.db, code, order_amount, items, customer_id, self.clock.now()).await?;
        let message = format!("Coupon applied. You save {}", applied.discount);
        Ok(CouponValidation { code: applied.code, discount: applied.discount, message })
    }
}

/// Looks up the coupon and works out the discount it gives this customer on this basket.
pub(crate) async fn evaluate_coupon<B>(
    db: &B,
    code: &str,
    order_amount: Cents,
    items: &[LineItem],
    customer_id: Option<&CustomerId>,
    now: DateTime<Utc>,
) -> Result<AppliedCoupon, CouponError>
where
    B: CouponManagement + OrderManagement,
{
    let coupon = db
        .fetch_coupon_by_code(code)
        .await?
        .ok_or_else(|| CouponError::CouponNotFound(code.trim().to_uppercase()))?;
    let prior_orders = match customer_id {
        Some(customer_id) => db.count_orders_for_customer(customer_id).await?,
        None => 0,
    };
    coupons::can_be_used_by(&coupon, customer_id, prior_orders, now)?;
    let discount = coupons::calculate_discount(&coupon, order_amount, items)?;
    trace!("🎟️ Coupon {} is worth {discount} on an order of {order_amount}", coupon.code);
    Ok(AppliedCoupon { coupon_id: coupon.id, code: coupon.code, discount })
}
