use std::time::Duration as StdDuration;

use chrono::Duration;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use settlement_common::Secret;

use crate::db_types::{CustomerIdentity, Network};

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Orders worth less than this in settlement stablecoin are rejected
    pub min_settlement_stable: Decimal,
    pub min_fiat_amount: Decimal,
    pub max_fiat_amount: Decimal,
    pub quote_ttl: Duration,
    /// How long an order may stay unpaid before it expires
    pub order_expiry: Duration,
    pub enable_liquidity_check: bool,
    pub enable_duplicate_guard: bool,
    /// Settlement confirmations with fewer block confirmations than this are ignored
    pub required_confirmations: u32,
    /// Networks where orders must be matched to a liquidity provider before they are accepted
    pub liquidity_networks: Vec<Network>,
    /// Suggested wait before retrying a retryable rejection
    pub retry_after: StdDuration,
    /// Timeout for the payment gateway and settlement executor calls
    pub collaborator_timeout: StdDuration,
    /// Fraction of the estimated token amount the settlement may fall short by
    pub slippage_tolerance: Decimal,
    /// HMAC key for settlement requests and settlement confirmations
    pub signing_key: Secret<String>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            min_settlement_stable: dec!(5),
            min_fiat_amount: dec!(1),
            max_fiat_amount: dec!(50_000_000),
            quote_ttl: Duration::minutes(5),
            order_expiry: Duration::minutes(30),
            enable_liquidity_check: true,
            enable_duplicate_guard: true,
            required_confirmations: 1,
            liquidity_networks: Network::all().to_vec(),
            retry_after: StdDuration::from_secs(30),
            collaborator_timeout: StdDuration::from_secs(15),
            slippage_tolerance: dec!(0.01),
            signing_key: Secret::default(),
        }
    }
}

impl CoordinatorConfig {
    pub fn with_signing_key<S: Into<String>>(mut self, key: S) -> Self {
        self.signing_key = Secret::new(key.into());
        self
    }

    pub fn with_liquidity_check(mut self, enabled: bool) -> Self {
        self.enable_liquidity_check = enabled;
        self
    }

    pub fn with_duplicate_guard(mut self, enabled: bool) -> Self {
        self.enable_duplicate_guard = enabled;
        self
    }

    pub fn with_order_expiry(mut self, expiry: Duration) -> Self {
        self.order_expiry = expiry;
        self
    }

    pub fn with_quote_ttl(mut self, ttl: Duration) -> Self {
        self.quote_ttl = ttl;
        self
    }

    pub fn with_required_confirmations(mut self, confirmations: u32) -> Self {
        self.required_confirmations = confirmations;
        self
    }

    pub fn with_min_settlement_stable(mut self, minimum: Decimal) -> Self {
        self.min_settlement_stable = minimum;
        self
    }

    pub fn requires_liquidity_check(&self, network: Network) -> bool {
        self.enable_liquidity_check && self.liquidity_networks.contains(&network)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub fiat_amount: Decimal,
    pub token: String,
    pub network: Network,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub business_id: String,
    /// Email address or phone number of the paying customer
    pub customer: String,
    pub recipient_address: String,
    pub fiat_amount: Decimal,
    pub token: String,
    pub network: Network,
}

impl OrderRequest {
    pub fn quote_request(&self) -> QuoteRequest {
        QuoteRequest { fiat_amount: self.fiat_amount, token: self.token.clone(), network: self.network }
    }

    pub fn customer_identity(&self) -> CustomerIdentity {
        CustomerIdentity::new(&self.customer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Success,
    Failed,
    #[serde(other)]
    Other,
}

/// A payment notification from the payment gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentEvent {
    /// The gateway's payment reference, or the order id we handed to the gateway
    pub reference: String,
    pub status: PaymentStatus,
    #[serde(default, alias = "paidAmount")]
    pub paid_amount: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SettlementStatus {
    Completed,
    Failed,
    Pending,
    #[serde(other)]
    Unknown,
}

/// An asynchronous settlement confirmation from the settlement executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementEvent {
    #[serde(alias = "orderId")]
    pub order_id: String,
    #[serde(alias = "txReference")]
    pub tx_reference: String,
    pub status: SettlementStatus,
    #[serde(default)]
    pub confirmations: u32,
    /// The token amount actually delivered
    #[serde(default, alias = "amountOut")]
    pub amount_out: Option<Decimal>,
    #[serde(default)]
    pub reason: Option<String>,
}
