//! Read-only pool quotes through a node gateway.
//!
//! The gateway wraps the quoter contracts of each EVM network behind two calls:
//!
//! * `POST /quote` with `{network, path: [{tokenIn, tokenOut, pool}], amountIn}` returns `{amountOut}`. Pools are
//!   named `v3-<fee>` (fee in hundredths of a basis point, e.g. `v3-500`) or `v2`. A `404` means there is no such pool
//!   and a `422` means the pool cannot absorb the amount. Any other failure is a reverted call.
//! * `GET /tokens/{network}/{token}` returns `{supported}` from the reserve allow-list.
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use settlement_engine::{
    db_types::Network,
    traits::{ChainQuoteError, ChainQuoter, PoolKind, SwapPath},
};

use super::{ApiClient, ApiClientError};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HopParams {
    pub token_in: String,
    pub token_out: String,
    pub pool: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteParams {
    pub network: Network,
    pub path: Vec<HopParams>,
    pub amount_in: Decimal,
}

impl QuoteParams {
    pub fn new(network: Network, path: &SwapPath, amount_in: Decimal) -> Self {
        let path = path
            .hops
            .iter()
            .map(|hop| HopParams {
                token_in: hop.token_in.clone(),
                token_out: hop.token_out.clone(),
                pool: pool_name(hop.pool),
            })
            .collect();
        Self { network, path, amount_in }
    }
}

pub fn pool_name(pool: PoolKind) -> String {
    match pool {
        PoolKind::Concentrated(tier) => format!("v3-{tier}"),
        PoolKind::ConstantProduct => "v2".to_string(),
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResult {
    amount_out: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
struct SupportedResult {
    supported: bool,
}

fn quote_error(e: ApiClientError) -> ChainQuoteError {
    match e {
        ApiClientError::Timeout => ChainQuoteError::Timeout,
        ApiClientError::QueryError { status: 404, .. } => ChainQuoteError::NoPool,
        ApiClientError::QueryError { status: 422, .. } => ChainQuoteError::InsufficientLiquidity,
        ApiClientError::QueryError { message, .. } => ChainQuoteError::Reverted(message),
        e => ChainQuoteError::RpcError(e.to_string()),
    }
}

pub struct HttpChainQuoter {
    client: ApiClient,
}

impl HttpChainQuoter {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ChainQuoter for HttpChainQuoter {
    async fn is_token_supported(&self, network: Network, token: &str) -> Result<bool, ChainQuoteError> {
        let path = format!("tokens/{network}/{token}");
        let result = self.client.get::<SupportedResult>(&path, &[]).await.map_err(|e| match e {
            ApiClientError::Timeout => ChainQuoteError::Timeout,
            e => ChainQuoteError::RpcError(e.to_string()),
        })?;
        Ok(result.supported)
    }

    async fn quote(&self, network: Network, path: &SwapPath, amount_in: Decimal) -> Result<Decimal, ChainQuoteError> {
        let params = QuoteParams::new(network, path, amount_in);
        let result = self.client.post::<QuoteResult, _>("quote", params).await.map_err(quote_error)?;
        Ok(result.amount_out)
    }
}
