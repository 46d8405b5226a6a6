use async_trait::async_trait;
use log::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use settlement_engine::{
    db_types::Network,
    traits::{AggregatorClient, AggregatorError, AggregatorQuote, AggregatorQuoteRequest},
};

use super::{ApiClient, ApiClientError};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct AggregatorParams {
    network: Network,
    input_token: String,
    output_token: String,
    amount: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatorResponse {
    pub output_amount: Decimal,
    pub price_impact: Decimal,
    #[serde(default)]
    pub route_steps: Vec<String>,
}

impl From<AggregatorResponse> for AggregatorQuote {
    fn from(r: AggregatorResponse) -> Self {
        AggregatorQuote { output_amount: r.output_amount, price_impact: r.price_impact, route_steps: r.route_steps }
    }
}

fn aggregator_error(e: ApiClientError) -> AggregatorError {
    match e {
        ApiClientError::Timeout => AggregatorError::Timeout,
        ApiClientError::QueryError { status: 404, message } => AggregatorError::NoRoute(message),
        ApiClientError::JsonError(e) => AggregatorError::InvalidResponse(e),
        e => AggregatorError::Unavailable(e.to_string()),
    }
}

/// An off-chain aggregator reached with `POST /quote`.
pub struct HttpAggregator {
    client: ApiClient,
}

impl HttpAggregator {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AggregatorClient for HttpAggregator {
    async fn quote(&self, request: AggregatorQuoteRequest) -> Result<AggregatorQuote, AggregatorError> {
        let params = AggregatorParams {
            network: request.network,
            input_token: request.input_token,
            output_token: request.output_token,
            amount: request.amount,
        };
        let response = self.client.post::<AggregatorResponse, _>("quote", params).await.map_err(aggregator_error)?;
        trace!("🧭️ Aggregator route: {}", response.route_steps.join(" → "));
        Ok(response.into())
    }
}
