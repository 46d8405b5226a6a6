use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::Network;

#[derive(Debug, Clone, Error)]
pub enum AggregatorError {
    #[error("The aggregator could not be reached: {0}")]
    Unavailable(String),
    #[error("The aggregator found no route: {0}")]
    NoRoute(String),
    #[error("The aggregator returned an invalid response: {0}")]
    InvalidResponse(String),
    #[error("The aggregator did not respond in time")]
    Timeout,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatorQuoteRequest {
    pub network: Network,
    pub input_token: String,
    pub output_token: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatorQuote {
    pub output_amount: Decimal,
    /// Fractional price impact, e.g. 0.01 is 1%
    pub price_impact: Decimal,
    pub route_steps: Vec<String>,
}

/// An off-chain service that returns an already-optimised route.
#[async_trait]
pub trait AggregatorClient: Send + Sync {
    async fn quote(&self, request: AggregatorQuoteRequest) -> Result<AggregatorQuote, AggregatorError>;
}
