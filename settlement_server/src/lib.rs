//! # Settlement routing server
//! This crate hosts the HTTP front end of the settlement routing engine. It is responsible for:
//! Quoting fiat amounts in supported tokens.
//! Accepting orders and handing them to the [`OrderCoordinator`](settlement_engine::OrderCoordinator).
//! Receiving payment notifications from the payment gateway and settlement confirmations from the executor.
//! Running the unpaid order expiry worker.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/quote`: Prices a fiat amount in a token.
//! * `/orders`, `/orders/{order_id}` and `/orders/{order_id}/cancel`: Order creation, lookup and cancellation.
//! * `/webhook/payment`: HMAC-checked payment notifications.
//! * `/webhook/settlement`: Signed settlement confirmations.

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod expiry_worker;
pub mod integrations;
pub mod middleware;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
