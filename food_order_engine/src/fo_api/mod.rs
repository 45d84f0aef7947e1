//! # Food Order Engine public API
//!
//! The `fo_api` module exposes the programmatic API for the engine. It is split by concern, so that clients can pick
//! the parts they need.
//!
//! * [`order_flow_api`] places orders, moves them through the fulfilment pipeline and applies payment results.
//! * [`loyalty_api`] gives access to loyalty balances and history, and applies queued accruals from delivered orders.
//! * [`coupon_api`] manages the coupon catalogue and checks coupons at checkout.
//!
//! The other submodules hold the error types and the request and response objects used by the APIs.
//!
//! # API usage
//!
//! Every API is created by supplying a database backend that implements the backend traits it needs.
//!
//! ```rust,ignore
//! use food_order_engine::{events::EventProducers, OrderFlowApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! let api = OrderFlowApi::new(db, EventProducers::default());
//! let order = api.create_order(new_order).await?;
//! ```

pub mod coupon_api;
pub mod errors;
pub mod loyalty_api;
pub mod order_flow_api;
pub mod order_objects;
pub mod payment_gateway;
