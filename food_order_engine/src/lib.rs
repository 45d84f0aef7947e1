//! Food Order Engine
//!
//! The Food Order Engine is the core of an online food-ordering platform. It takes an order from checkout through
//! payment confirmation and the kitchen and delivery pipeline, crediting loyalty points once the food has arrived.
//!
//! The library is divided into the following sections:
//! 1. Database management and control ([`mod@db`]). SQLite is the supported backend. You should never need to access
//!    the database directly. Instead, use the public API provided by the engine. The exception is the data types used
//!    in the database. These are defined in the [`db_types`] module and are public.
//! 2. The pure domain rules: the status transition table ([`order_lifecycle`]), the loyalty arithmetic
//!    ([`loyalty`]) and the coupon evaluator ([`coupons`]). None of these touch storage and all are unit-tested in
//!    isolation.
//! 3. The engine public API ([`mod@fo_api`]). [`OrderFlowApi`], [`LoyaltyApi`] and [`CouponApi`] each wrap a backend
//!    that implements the matching management trait.
//!
//! The engine also emits events when orders are created or change status. A simple actor framework ([`events`]) lets
//! you hook into these events. The [`notifications`] module uses these hooks to fan status changes out to real-time
//! subscribers and to the transactional email service.
mod db;

pub mod coupons;
pub mod db_types;
pub mod events;
mod fo_api;
pub mod helpers;
pub mod loyalty;
pub mod notifications;
pub mod order_lifecycle;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use db::sqlite::{SqliteDatabase, SqliteDatabaseError};
pub use db::traits::{CouponManagement, LoyaltyManagement, OrderManagement, StoreError};
pub use fo_api::{
    coupon_api::CouponApi,
    errors::{CouponError, LoyaltyError, OrderFlowError},
    loyalty_api::{LoyaltyApi, ACCRUAL_LOG_TARGET},
    order_flow_api::{OrderFlowApi, PAYMENT_CONFIRMED_NOTE},
    order_objects,
    payment_gateway::{GatewayError, PaymentGateway, PaymentVerification},
};
