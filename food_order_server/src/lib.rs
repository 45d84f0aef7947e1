//! # Food order server
//! The HTTP front end for the food order engine. It is responsible for:
//! * Receiving payment gateway webhooks and applying the payment result to the matching order.
//! * Running the background workers: the loyalty outbox sweep and the notification logger.
//! * Wiring order events into the notification fan-out.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/webhook/payment`: Payment gateway callbacks, signed with HMAC-SHA512 in the `X-Payment-Signature` header.

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod workers;

#[cfg(test)]
mod endpoint_tests;
