//! #  Database management and control.
//!
//! The engine only persists the order record. The contract a backend has to fulfil is
//! [`crate::traits::OrderManagement`]; SQLite is the supported backend.
#[cfg(feature = "sqlite")]
pub mod sqlite;
