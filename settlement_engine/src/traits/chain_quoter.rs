use std::fmt::Display;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::Network;

#[derive(Debug, Clone, Error)]
pub enum ChainQuoteError {
    #[error("There is no pool for this path")]
    NoPool,
    #[error("The pool does not have enough liquidity for this amount")]
    InsufficientLiquidity,
    #[error("The quote call reverted: {0}")]
    Reverted(String),
    #[error("RPC error: {0}")]
    RpcError(String),
    #[error("The quote call timed out")]
    Timeout,
}

/// Fee tiers of concentrated-liquidity pools, in hundredths of a basis point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeeTier {
    /// 0.01%
    Lowest,
    /// 0.05%
    Low,
    /// 0.3%
    Medium,
    /// 1%
    High,
}

impl FeeTier {
    pub fn all() -> &'static [FeeTier] {
        &[FeeTier::Lowest, FeeTier::Low, FeeTier::Medium, FeeTier::High]
    }

    pub fn as_u32(&self) -> u32 {
        match self {
            FeeTier::Lowest => 100,
            FeeTier::Low => 500,
            FeeTier::Medium => 3000,
            FeeTier::High => 10000,
        }
    }
}

impl Display for FeeTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_u32())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PoolKind {
    Concentrated(FeeTier),
    ConstantProduct,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapHop {
    pub token_in: String,
    pub token_out: String,
    pub pool: PoolKind,
}

/// An ordered list of pool hops from the input token to the output token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapPath {
    pub hops: Vec<SwapHop>,
}

impl SwapPath {
    pub fn direct(token_in: &str, token_out: &str, pool: PoolKind) -> Self {
        Self { hops: vec![SwapHop { token_in: token_in.to_string(), token_out: token_out.to_string(), pool }] }
    }

    pub fn two_hop(token_in: &str, via: &str, token_out: &str, first: PoolKind, second: PoolKind) -> Self {
        Self {
            hops: vec![
                SwapHop { token_in: token_in.to_string(), token_out: via.to_string(), pool: first },
                SwapHop { token_in: via.to_string(), token_out: token_out.to_string(), pool: second },
            ],
        }
    }

    pub fn is_direct(&self) -> bool {
        self.hops.len() == 1
    }
}

/// Read-only access to the pools of networks where prices are discovered on-chain.
#[async_trait]
pub trait ChainQuoter: Send + Sync {
    /// Whether `token` (a contract address) is on the network's reserve allow-list.
    async fn is_token_supported(&self, network: Network, token: &str) -> Result<bool, ChainQuoteError>;

    /// The amount of the path's final token received for `amount_in` of its first token.
    async fn quote(&self, network: Network, path: &SwapPath, amount_in: Decimal) -> Result<Decimal, ChainQuoteError>;
}
