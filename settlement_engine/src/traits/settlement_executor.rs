use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{db_types::Network, helpers::SignedPayload};

#[derive(Debug, Clone, Error)]
pub enum SettlementExecutorError {
    #[error("The settlement executor could not be reached: {0}")]
    Unavailable(String),
    #[error("The settlement executor rejected the request: {0}")]
    Rejected(String),
    #[error("The settlement executor did not respond in time")]
    Timeout,
}

/// The body of a settlement request. It is signed before dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementRequest {
    pub order_id: String,
    pub network: Network,
    /// The settlement stablecoin contract the provider pays out of
    pub input_token: String,
    /// The contract of the token the customer receives
    pub output_token: String,
    /// Settlement stablecoin amount
    pub amount: Decimal,
    pub min_amount_out: Decimal,
    pub recipient: String,
    /// Absent when liquidity checks are disabled or the roster runs in degraded mode
    pub provider: Option<String>,
    pub route_id: String,
}

/// The executor's acknowledgement of a dispatched request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementReceipt {
    pub settlement_reference: String,
}

/// Performs the actual settlement transfer. Confirmation arrives asynchronously through the settlement webhook.
#[async_trait]
pub trait SettlementExecutor: Send + Sync {
    async fn dispatch(&self, request: SignedPayload) -> Result<SettlementReceipt, SettlementExecutorError>;
}
