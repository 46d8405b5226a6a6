//! Settlement Routing Engine
//!
//! The settlement routing engine lets businesses accept fiat from their customers and settle the value on-chain, in the
//! token and on the network of the customer's choice. This library contains the core logic of the engine. It is
//! agnostic of the payment gateway, the rate feeds, the DEX quoters and the settlement executor, which are all reached
//! through the traits in [`mod@traits`].
//!
//! The library is divided into three main sections:
//! 1. Order persistence ([`mod@db`]). SQLite is the supported backend. Callers should not need to touch the database
//!    directly; the data types it stores live in [`mod@db_types`] and are public.
//! 2. Pricing. The [`RateOracle`] converts fiat into the settlement stablecoin, the [`RouteFinder`] prices the target
//!    token against it, and the [`ProviderMatcher`] (behind the [`LiquidityCache`]) checks that a single liquidity
//!    provider can fund the settlement.
//! 3. The [`OrderCoordinator`], which runs the order lifecycle from quote to completed settlement.
//!
//! The coordinator emits events for every order that is created and every status change that is applied. A simple
//! actor framework ([`mod@events`]) lets you hook into these events; the [`WebhookNotifier`] uses it to notify
//! businesses.
pub mod db;

pub mod db_types;
pub mod duplicate_guard;
pub mod events;
pub mod helpers;
pub mod liquidity_cache;
pub mod order_coordinator;
pub mod provider_matcher;
pub mod quote_objects;
pub mod rate_oracle;
pub mod route_finder;
pub mod token_registry;
pub mod traits;
pub mod webhook_notifier;


#[cfg(feature = "sqlite")]
pub use db::sqlite::SqliteDatabase;
pub use duplicate_guard::DuplicateGuard;
pub use liquidity_cache::{LiquidityCache, LiquidityCacheConfig};
pub use order_coordinator::{Collaborators, CoordinatorConfig, OrderCoordinator, OrderFlowError};
pub use provider_matcher::{ProviderMatcher, ScoringConfig};
pub use rate_oracle::{RateOracle, RateOracleConfig};
pub use route_finder::{RouteFinder, RouteFinderConfig};
pub use token_registry::TokenRegistry;
pub use traits::OrderManagement;
pub use webhook_notifier::WebhookNotifier;
