//! Primitives shared between the settlement engine and its server.
mod secret;

pub mod helpers;

pub use secret::Secret;
