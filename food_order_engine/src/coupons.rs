//! Coupon validation, eligibility and discount rules.
//!
//! These are pure functions over a [`Coupon`] snapshot. Availability and usage limits are checked here for a quick
//! answer at checkout, and checked again inside the order-creation transaction when the usage is recorded.
use chrono::{DateTime, Utc};
use fo_common::Cents;
use thiserror::Error;

use crate::db_types::{Coupon, CustomerId, DiscountKind, LineItem};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CouponRejection {
    /// The coupon cannot be used by anyone right now.
    #[error("{0}")]
    Invalid(String),
    /// The coupon is valid, but not for this customer or basket.
    #[error("{0}")]
    NotEligible(String),
}

/// Checks that the coupon is active, inside its validity window and not used up.
pub fn validate(coupon: &Coupon, now: DateTime<Utc>) -> Result<(), CouponRejection> {
    if !coupon.is_active {
        return Err(CouponRejection::Invalid("Coupon is not active".into()));
    }
    if now < coupon.valid_from {
        return Err(CouponRejection::Invalid("Coupon is not yet valid".into()));
    }
    if now > coupon.valid_until {
        return Err(CouponRejection::Invalid("Coupon has expired".into()));
    }
    if coupon.usage_limit.is_some_and(|limit| coupon.usage_count() >= limit as usize) {
        return Err(CouponRejection::Invalid("Coupon usage limit has been reached".into()));
    }
    Ok(())
}

/// Checks whether `customer` may use the coupon. Guests (`None`) cannot use coupons that are restricted to first
/// orders or to named customers, since neither restriction can be verified for them.
pub fn can_be_used_by(
    coupon: &Coupon,
    customer: Option<&CustomerId>,
    prior_order_count: u64,
    now: DateTime<Utc>,
) -> Result<(), CouponRejection> {
    validate(coupon, now)?;
    let not_eligible = |msg: &str| Err(CouponRejection::NotEligible(msg.to_string()));
    let Some(customer) = customer else {
        if coupon.first_order_only || !coupon.allowed_customers.is_empty() {
            return not_eligible("Please sign in to use this coupon");
        }
        return Ok(());
    };
    if coupon.first_order_only && prior_order_count > 0 {
        return not_eligible("Coupon is only valid for your first order");
    }
    if coupon.excluded_customers.contains(customer) {
        return not_eligible("You are not eligible for this coupon");
    }
    if !coupon.allowed_customers.is_empty() && !coupon.allowed_customers.contains(customer) {
        return not_eligible("You are not eligible for this coupon");
    }
    if coupon.usage_limit_per_user.is_some_and(|limit| coupon.usage_count_for(customer) >= limit as usize) {
        return not_eligible("You have already used this coupon the maximum number of times");
    }
    Ok(())
}

fn category_matches(list: &[String], category: Option<&str>) -> bool {
    category.is_some_and(|c| list.iter().any(|l| l.eq_ignore_ascii_case(c)))
}

/// The part of the basket the coupon applies to, after category filtering.
pub fn eligible_amount(coupon: &Coupon, order_amount: Cents, items: &[LineItem]) -> Cents {
    if coupon.applicable_categories.is_empty() && coupon.excluded_categories.is_empty() {
        return order_amount;
    }
    items
        .iter()
        .filter(|i| {
            coupon.applicable_categories.is_empty() ||
                category_matches(&coupon.applicable_categories, i.category.as_deref())
        })
        .filter(|i| !category_matches(&coupon.excluded_categories, i.category.as_deref()))
        .map(LineItem::line_total)
        .sum()
}

/// Calculates the discount the coupon gives on an order of `order_amount` made up of `items`.
pub fn calculate_discount(coupon: &Coupon, order_amount: Cents, items: &[LineItem]) -> Result<Cents, CouponRejection> {
    if order_amount < coupon.min_order_amount {
        return Err(CouponRejection::NotEligible(format!(
            "Minimum order amount of {} is required for this coupon",
            coupon.min_order_amount
        )));
    }
    let base = eligible_amount(coupon, order_amount, items);
    if base.value() <= 0 {
        return Err(CouponRejection::NotEligible("No eligible items for this coupon".into()));
    }
    let discount = match coupon.discount {
        DiscountKind::Percentage { basis_points, max_discount } => {
            let discount = base.basis_points(basis_points);
            match max_discount {
                Some(cap) if discount > cap => cap,
                _ => discount,
            }
        },
        DiscountKind::Fixed { amount } => amount.min(base),
    };
    Ok(discount.min(order_amount))
}
