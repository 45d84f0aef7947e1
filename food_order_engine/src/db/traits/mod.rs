//! # Database management and control.
//!
//! This module defines the interface contracts of the engine's database *backends*.
//!
//! * [`OrderManagement`] stores orders, their line items and their status history. It is responsible for the
//!   atomicity guarantees of the order lifecycle: order numbers are allocated, coupon usage is recorded and loyalty
//!   accruals are queued in the same transaction as the order change that causes them.
//! * [`LoyaltyManagement`] stores loyalty accounts, their transaction history and the accrual outbox.
//! * [`CouponManagement`] stores coupons and their usage history.
//!
//! All writes that can race are guarded by compare-and-swap. A backend reports a lost race as
//! [`StoreError::ConcurrentModification`] and leaves the record untouched.
mod coupon_management;
mod errors;
mod loyalty_management;
mod order_management;

pub use coupon_management::CouponManagement;
pub use errors::StoreError;
pub use loyalty_management::LoyaltyManagement;
pub use order_management::OrderManagement;
