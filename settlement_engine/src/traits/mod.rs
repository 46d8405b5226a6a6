//! # Collaborator contracts
//!
//! The engine decides *what* should happen to an order and *who* should fund it. Everything else is delegated to
//! collaborators that implement the traits in this module:
//!
//! * [`OrderManagement`] persists the order record. It is the only stateful collaborator, and the only one that is
//!   generic (`OrderCoordinator<B: OrderManagement>`) rather than a trait object.
//! * [`RateSource`] quotes the settlement stablecoin in fiat.
//! * [`ChainQuoter`] performs read-only pool quotes on networks where prices are discovered on-chain.
//! * [`AggregatorClient`] asks an off-chain aggregator for an optimised route.
//! * [`ProviderRoster`] lists the liquidity providers and their balances.
//! * [`SettlementExecutor`] receives signed settlement requests. It performs the actual transfer.
//! * [`PaymentGateway`] issues hosted checkout links.
//! * [`WebhookSink`] delivers signed notifications to businesses.
mod aggregator;
mod chain_quoter;
mod data_objects;
mod order_management;
mod payment_gateway;
mod provider_roster;
mod rate_source;
mod settlement_executor;
mod webhook_sink;

pub use aggregator::{AggregatorClient, AggregatorError, AggregatorQuote, AggregatorQuoteRequest};
pub use chain_quoter::{ChainQuoteError, ChainQuoter, FeeTier, PoolKind, SwapHop, SwapPath};
pub use data_objects::TransitionOutcome;
pub use order_management::{OrderManagement, OrderStoreError};
pub use payment_gateway::{CheckoutRequest, CheckoutSession, PaymentGateway, PaymentGatewayError};
pub use provider_roster::{Provider, ProviderRoster, ProviderRosterError};
pub use rate_source::{RateSource, RateSourceError};
pub use settlement_executor::{SettlementExecutor, SettlementExecutorError, SettlementReceipt, SettlementRequest};
pub use webhook_sink::{WebhookError, WebhookSink};
