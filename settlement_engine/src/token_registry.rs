//! The set of tokens that can be purchased, per network, along with their fee schedule.
use std::{fs, path::Path};

use log::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::Network;

#[derive(Debug, Error)]
pub enum TokenRegistryError {
    #[error("Could not read token registry file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Invalid token registry definition: {0}")]
    InvalidDefinition(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenConfig {
    pub symbol: String,
    pub network: Network,
    pub contract_address: String,
    pub decimals: u32,
    /// The service fee charged on purchases of this token, as a fraction
    pub fee_pct: Decimal,
    /// True if the token is the settlement stablecoin on its network
    #[serde(default)]
    pub settlement_equivalent: bool,
}

#[derive(Debug, Clone, Default)]
pub struct TokenRegistry {
    tokens: Vec<TokenConfig>,
}

impl TokenRegistry {
    pub fn new(tokens: Vec<TokenConfig>) -> Result<Self, TokenRegistryError> {
        for (i, token) in tokens.iter().enumerate() {
            if token.fee_pct < Decimal::ZERO || token.fee_pct >= Decimal::ONE {
                return Err(TokenRegistryError::InvalidDefinition(format!(
                    "fee_pct for {} on {} must be in [0, 1)",
                    token.symbol, token.network
                )));
            }
            let duplicate = tokens[..i]
                .iter()
                .any(|t| t.network == token.network && t.symbol.eq_ignore_ascii_case(&token.symbol));
            if duplicate {
                return Err(TokenRegistryError::InvalidDefinition(format!(
                    "{} is defined more than once on {}",
                    token.symbol, token.network
                )));
            }
        }
        Ok(Self { tokens })
    }

    pub fn from_json_str(json: &str) -> Result<Self, TokenRegistryError> {
        let tokens: Vec<TokenConfig> =
            serde_json::from_str(json).map_err(|e| TokenRegistryError::InvalidDefinition(e.to_string()))?;
        Self::new(tokens)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, TokenRegistryError> {
        let json = fs::read_to_string(path.as_ref())?;
        let registry = Self::from_json_str(&json)?;
        info!("🪛️ Loaded {} token definitions from {}", registry.tokens.len(), path.as_ref().display());
        Ok(registry)
    }

    /// Case-insensitive lookup of a token on a network.
    pub fn lookup(&self, symbol: &str, network: Network) -> Option<&TokenConfig> {
        self.tokens.iter().find(|t| t.network == network && t.symbol.eq_ignore_ascii_case(symbol.trim()))
    }

    /// The settlement stablecoin definition for the network, if one is registered.
    pub fn settlement_token(&self, network: Network) -> Option<&TokenConfig> {
        self.tokens.iter().find(|t| t.network == network && t.settlement_equivalent)
    }

    pub fn tokens(&self) -> &[TokenConfig] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// A registry with the stablecoin and the wrapped native asset of every supported network.
    pub fn builtin() -> Self {
        let token = |symbol: &str, network, address: &str, decimals, fee_pct, settlement_equivalent| TokenConfig {
            symbol: symbol.to_string(),
            network,
            contract_address: address.to_string(),
            decimals,
            fee_pct,
            settlement_equivalent,
        };
        let tokens = vec![
            token("USDC", Network::Base, "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913", 6, dec!(0.01), true),
            token("WETH", Network::Base, "0x4200000000000000000000000000000000000006", 18, dec!(0.015), false),
            token("USDC", Network::Ethereum, "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48", 6, dec!(0.01), true),
            token("WETH", Network::Ethereum, "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2", 18, dec!(0.015), false),
            token("USDC", Network::Polygon, "0x3c499c542cEF5E3811e1192ce70d8cC03d5c3359", 6, dec!(0.01), true),
            token("WPOL", Network::Polygon, "0x0d500B1d8E8eF31E21C99d1Db9A6444d3ADf1270", 18, dec!(0.015), false),
            token("USDC", Network::Solana, "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v", 6, dec!(0.01), true),
            token("SOL", Network::Solana, "So11111111111111111111111111111111111111112", 9, dec!(0.015), false),
        ];
        Self { tokens }
    }
}
