//! Quote data types.
//!
//! A [`Quote`] is created for every order request and never persisted on its own. Once an order is created from it,
//! the relevant details are frozen into a [`QuoteSnapshot`] and stored in the order's metadata, so that the rate tier,
//! route and provider that justified the order can always be audited later.
use std::fmt::Display;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{FeeBreakdown, Network},
    liquidity_cache::LiquiditySource,
};

//--------------------------------------        RateTier       ---------------------------------------------------------
/// The step of the rate fallback chain that produced a rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateTier {
    Primary,
    Secondary,
    Static,
    Emergency,
}

impl RateTier {
    pub fn is_fallback(&self) -> bool {
        !matches!(self, RateTier::Primary)
    }
}

impl Display for RateTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RateTier::Primary => write!(f, "primary"),
            RateTier::Secondary => write!(f, "secondary"),
            RateTier::Static => write!(f, "static"),
            RateTier::Emergency => write!(f, "emergency"),
        }
    }
}

/// Fiat per unit of settlement stablecoin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StableRate {
    pub rate: Decimal,
    pub tier: RateTier,
    pub fetched_at: DateTime<Utc>,
}

impl StableRate {
    pub fn new(rate: Decimal, tier: RateTier) -> Self {
        Self { rate, tier, fetched_at: Utc::now() }
    }

    /// Converts a fiat amount into settlement stablecoin at this rate.
    pub fn fiat_to_stable(&self, fiat: Decimal) -> Decimal {
        fiat / self.rate
    }

    pub fn stable_to_fiat(&self, stable: Decimal) -> Decimal {
        stable * self.rate
    }
}

//--------------------------------------      NetworkQuote     ---------------------------------------------------------
/// The network-specific half of a route quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NetworkQuote {
    /// Priced by probing pools directly. `price_impact` is only known for sized quotes.
    OnChain { strategy: String, price_impact: Option<Decimal> },
    /// Priced by an off-chain aggregator, which reports its own price impact and route.
    Aggregator { price_impact: Decimal, route_steps: Vec<String> },
    /// The token is the settlement stablecoin itself. No conversion takes place.
    Identity,
}

impl NetworkQuote {
    pub fn price_impact(&self) -> Option<Decimal> {
        match self {
            NetworkQuote::OnChain { price_impact, .. } => *price_impact,
            NetworkQuote::Aggregator { price_impact, .. } => Some(*price_impact),
            NetworkQuote::Identity => Some(Decimal::ZERO),
        }
    }
}

/// The result of a successful route search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteQuote {
    /// Settlement stablecoin per unit of the token
    pub price_per_unit: Decimal,
    /// Settlement stablecoin received for `token_amount` tokens
    pub total_output: Decimal,
    pub token_amount: Decimal,
    pub route_id: String,
    pub pool_liquidity_adequate: bool,
    pub detail: NetworkQuote,
}

impl RouteQuote {
    pub fn identity(amount: Decimal) -> Self {
        Self {
            price_per_unit: Decimal::ONE,
            total_output: amount,
            token_amount: amount,
            route_id: "identity".to_string(),
            pool_liquidity_adequate: true,
            detail: NetworkQuote::Identity,
        }
    }
}

//--------------------------------------         Quote         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quote {
    pub token: String,
    pub network: Network,
    pub fees: FeeBreakdown,
    pub rate: StableRate,
    /// The settlement-stablecoin value of the net fiat amount
    pub settlement_stable_amount: Decimal,
    pub token_amount: Decimal,
    pub price_per_unit: Decimal,
    pub route_id: String,
    pub pool_liquidity_adequate: bool,
    pub provider_candidate: Option<String>,
    pub liquidity_ratio: Option<Decimal>,
    pub liquidity_source: LiquiditySource,
    pub detail: NetworkQuote,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Quote {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn snapshot(&self) -> QuoteSnapshot {
        QuoteSnapshot {
            rate: self.rate.rate,
            rate_tier: self.rate.tier,
            settlement_stable_amount: self.settlement_stable_amount,
            price_per_unit: self.price_per_unit,
            route_id: self.route_id.clone(),
            pool_liquidity_adequate: self.pool_liquidity_adequate,
            provider: self.provider_candidate.clone(),
            liquidity_ratio: self.liquidity_ratio,
            liquidity_source: self.liquidity_source,
            detail: self.detail.clone(),
            quote_issued_at: self.issued_at,
            quote_expires_at: self.expires_at,
        }
    }
}

/// The audit record of the quote that an order was created from. It is stored as JSON in the order's `metadata`
/// column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteSnapshot {
    pub rate: Decimal,
    pub rate_tier: RateTier,
    pub settlement_stable_amount: Decimal,
    pub price_per_unit: Decimal,
    pub route_id: String,
    pub pool_liquidity_adequate: bool,
    pub provider: Option<String>,
    pub liquidity_ratio: Option<Decimal>,
    pub liquidity_source: LiquiditySource,
    pub detail: NetworkQuote,
    pub quote_issued_at: DateTime<Utc>,
    pub quote_expires_at: DateTime<Utc>,
}

impl QuoteSnapshot {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.quote_expires_at <= now
    }
}
