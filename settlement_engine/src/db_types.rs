use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::quote_objects::QuoteSnapshot;

#[derive(Debug, Clone, Error)]
#[error("Conversion error: {0}")]
pub struct ConversionError(String);

//--------------------------------------        Network        ---------------------------------------------------------
/// The networks a settlement can be delivered on. The network is always passed explicitly; there is no ambient
/// "current network".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Base,
    Ethereum,
    Polygon,
    Solana,
}

/// How prices are discovered on a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingMode {
    /// Pools are probed directly through read-only quoter calls.
    OnChainPools,
    /// A single call to an off-chain aggregator returns an already-optimised route.
    Aggregator,
}

impl Network {
    pub fn routing_mode(&self) -> RoutingMode {
        match self {
            Network::Solana => RoutingMode::Aggregator,
            Network::Base | Network::Ethereum | Network::Polygon => RoutingMode::OnChainPools,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Base => "base",
            Network::Ethereum => "ethereum",
            Network::Polygon => "polygon",
            Network::Solana => "solana",
        }
    }

    pub fn all() -> &'static [Network] {
        &[Network::Base, Network::Ethereum, Network::Polygon, Network::Solana]
    }
}

impl Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "base" => Ok(Self::Base),
            "ethereum" | "eth" => Ok(Self::Ethereum),
            "polygon" | "matic" => Ok(Self::Polygon),
            "solana" | "sol" => Ok(Self::Solana),
            s => Err(ConversionError(format!("Unknown network: {s}"))),
        }
    }
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatusType {
    /// The order has been created and a checkout link issued. No payment has been received.
    Initiated,
    /// The fiat payment has been confirmed by the payment gateway.
    Pending,
    /// The settlement request has been handed off to the settlement executor.
    Processing,
    /// The settlement executor confirmed delivery of the tokens.
    Completed,
    /// Payment or settlement failed. See `failure_reason`.
    Failed,
    /// The order was cancelled before settlement was dispatched.
    Cancelled,
    /// The order was not paid within its expiry window.
    Expired,
}

impl OrderStatusType {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled | Self::Expired)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initiated => "INITIATED",
            Self::Pending => "PENDING",
            Self::Processing => "PROCESSING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
            Self::Expired => "EXPIRED",
        }
    }

    /// The states from which a transition into `self` is legal. `Initiated` is the entry state and has no sources.
    pub fn valid_sources(&self) -> &'static [OrderStatusType] {
        use OrderStatusType::*;
        match self {
            Initiated => &[],
            Pending => &[Initiated],
            Processing => &[Pending],
            Completed => &[Processing],
            Failed => &[Initiated, Pending, Processing],
            Cancelled => &[Initiated, Pending],
            Expired => &[Initiated],
        }
    }

    pub fn can_transition_to(&self, next: OrderStatusType) -> bool {
        next.valid_sources().contains(self)
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INITIATED" => Ok(Self::Initiated),
            "PENDING" => Ok(Self::Pending),
            "PROCESSING" => Ok(Self::Processing),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            "CANCELLED" => Ok(Self::Cancelled),
            "EXPIRED" => Ok(Self::Expired),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

impl From<String> for OrderStatusType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to Failed");
            OrderStatusType::Failed
        })
    }
}

//--------------------------------------        OrderId        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ConversionError("Order id cannot be empty".into()));
        }
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------   CustomerIdentity    ---------------------------------------------------------
/// The identity the duplicate guard keys on. Email addresses and phone numbers are normalised so that
/// `Alice@Example.com ` and `alice@example.com` are the same customer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerIdentity(String);

impl CustomerIdentity {
    pub fn new<S: AsRef<str>>(raw: S) -> Self {
        Self(raw.as_ref().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CustomerIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

//--------------------------------------      FeeBreakdown     ---------------------------------------------------------
/// The fee split of a fiat amount. `net_amount = fiat_amount - round(fiat_amount * fee_pct)`, where rounding is to
/// whole fiat units, half away from zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub fiat_amount: Decimal,
    /// The fee as a fraction, i.e. 0.015 is a 1.5% fee
    pub fee_pct: Decimal,
    pub fee_amount: Decimal,
    pub net_amount: Decimal,
}

impl FeeBreakdown {
    pub fn calculate(fiat_amount: Decimal, fee_pct: Decimal) -> Self {
        let fee_amount = (fiat_amount * fee_pct).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        Self { fiat_amount, fee_pct, fee_amount, net_amount: fiat_amount - fee_amount }
    }
}

//--------------------------------------        Order          ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    pub business_id: String,
    pub customer_id: CustomerIdentity,
    /// The wallet address the tokens are delivered to
    pub recipient_address: String,
    pub fiat_amount: Decimal,
    pub fee_pct: Decimal,
    pub fee_amount: Decimal,
    pub net_amount: Decimal,
    pub target_token: String,
    pub target_network: Network,
    pub token_contract_address: String,
    /// Fiat per unit of settlement stablecoin at the time the order was quoted
    pub exchange_rate: Decimal,
    pub estimated_token_amount: Decimal,
    pub actual_token_amount: Option<Decimal>,
    pub status: OrderStatusType,
    pub failure_reason: Option<String>,
    pub checkout_url: Option<String>,
    pub payment_reference: Option<String>,
    pub settlement_reference: Option<String>,
    /// The liquidity provider the settlement was dispatched to
    pub settlement_provider: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub metadata: QuoteSnapshot,
}

impl Order {
    pub fn fee_breakdown(&self) -> FeeBreakdown {
        FeeBreakdown {
            fiat_amount: self.fiat_amount,
            fee_pct: self.fee_pct,
            fee_amount: self.fee_amount,
            net_amount: self.net_amount,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.status == OrderStatusType::Initiated && self.expires_at <= now
    }
}

//--------------------------------------        NewOrder       ---------------------------------------------------------
/// Everything needed to persist a fresh order. New orders always enter the `Initiated` state.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_id: OrderId,
    pub business_id: String,
    pub customer_id: CustomerIdentity,
    pub recipient_address: String,
    pub fees: FeeBreakdown,
    pub target_token: String,
    pub target_network: Network,
    pub token_contract_address: String,
    pub exchange_rate: Decimal,
    pub estimated_token_amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub metadata: QuoteSnapshot,
}

//--------------------------------------     StatusUpdate      ---------------------------------------------------------
/// A requested state change, together with the data that is only written on that transition.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub new_status: OrderStatusType,
    pub reason: Option<String>,
    pub payment_reference: Option<String>,
    pub settlement_reference: Option<String>,
    pub actual_token_amount: Option<Decimal>,
    pub provider: Option<String>,
    /// When set, the update only applies from these states, on top of the usual transition rules.
    pub only_from: Option<Vec<OrderStatusType>>,
}

impl StatusUpdate {
    pub fn new(new_status: OrderStatusType) -> Self {
        Self {
            new_status,
            reason: None,
            payment_reference: None,
            settlement_reference: None,
            actual_token_amount: None,
            provider: None,
            only_from: None,
        }
    }

    /// Narrows the states this update may apply from. Repeated calls narrow further.
    pub fn only_from(mut self, statuses: &[OrderStatusType]) -> Self {
        let allowed = statuses.iter().copied().filter(|s| self.permits(*s)).collect();
        self.only_from = Some(allowed);
        self
    }

    /// Whether an order in `status` may take this update.
    pub fn permits(&self, status: OrderStatusType) -> bool {
        status.can_transition_to(self.new_status) && self.only_from.as_ref().map_or(true, |s| s.contains(&status))
    }

    /// The states the store must find the order in for this update to apply.
    pub fn sources(&self) -> Vec<OrderStatusType> {
        self.new_status.valid_sources().iter().copied().filter(|s| self.permits(*s)).collect()
    }

    pub fn with_reason<S: Into<String>>(mut self, reason: S) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_payment_reference<S: Into<String>>(mut self, reference: S) -> Self {
        self.payment_reference = Some(reference.into());
        self
    }

    pub fn with_settlement_reference<S: Into<String>>(mut self, reference: S) -> Self {
        self.settlement_reference = Some(reference.into());
        self
    }

    pub fn with_actual_token_amount(mut self, amount: Decimal) -> Self {
        self.actual_token_amount = Some(amount);
        self
    }

    pub fn with_provider<S: Into<String>>(mut self, provider: S) -> Self {
        self.provider = Some(provider.into());
        self
    }
}
