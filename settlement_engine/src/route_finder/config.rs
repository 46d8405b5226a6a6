use std::{collections::HashMap, time::Duration};

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::{db_types::Network, traits::FeeTier};

/// Pool topology for one on-chain network.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkRouting {
    /// Contract address of the settlement stablecoin
    pub stable_token: String,
    /// Contract address and label of the common base asset used for two-hop routes
    pub intermediate: Option<(String, String)>,
    pub fee_tiers: Vec<FeeTier>,
    /// Whether constant-product pools exist on this network
    pub constant_product: bool,
}

#[derive(Debug, Clone)]
pub struct RouteFinderConfig {
    pub networks: HashMap<Network, NetworkRouting>,
    /// Upper bound for a single strategy probe and for the allow-list check
    pub probe_timeout: Duration,
    pub aggregator_timeout: Duration,
    /// The largest acceptable price impact of a sized quote, as a fraction
    pub max_price_impact: Decimal,
}

impl Default for RouteFinderConfig {
    fn default() -> Self {
        let evm = |stable: &str, via: &str, label: &str| NetworkRouting {
            stable_token: stable.to_string(),
            intermediate: Some((via.to_string(), label.to_string())),
            fee_tiers: FeeTier::all().to_vec(),
            constant_product: true,
        };
        let mut networks = HashMap::new();
        networks.insert(
            Network::Base,
            evm("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913", "0x4200000000000000000000000000000000000006", "weth"),
        );
        networks.insert(
            Network::Ethereum,
            evm("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48", "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2", "weth"),
        );
        networks.insert(
            Network::Polygon,
            evm("0x3c499c542cEF5E3811e1192ce70d8cC03d5c3359", "0x0d500B1d8E8eF31E21C99d1Db9A6444d3ADf1270", "wpol"),
        );
        networks.insert(
            Network::Solana,
            NetworkRouting {
                stable_token: "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v".to_string(),
                intermediate: None,
                fee_tiers: vec![],
                constant_product: false,
            },
        );
        Self {
            networks,
            probe_timeout: Duration::from_secs(5),
            aggregator_timeout: Duration::from_secs(10),
            max_price_impact: dec!(0.02),
        }
    }
}

impl RouteFinderConfig {
    pub fn with_network(mut self, network: Network, routing: NetworkRouting) -> Self {
        self.networks.insert(network, routing);
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_max_price_impact(mut self, impact: Decimal) -> Self {
        self.max_price_impact = impact;
        self
    }

    pub fn routing(&self, network: Network) -> Option<&NetworkRouting> {
        self.networks.get(&network)
    }
}
