//! Enumeration of the on-chain pricing strategies for a token.
use crate::{
    route_finder::NetworkRouting,
    traits::{PoolKind, SwapPath},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Strategy {
    pub id: String,
    pub path: SwapPath,
}

/// Lists every strategy for converting `token` into the settlement stablecoin:
///
/// * a direct concentrated-liquidity pool at each fee tier,
/// * a direct constant-product pool,
/// * two hops through the intermediate asset, over every pair of fee tiers,
/// * two hops through the intermediate asset over constant-product pools.
///
/// Two-hop strategies are skipped when the token *is* the intermediate asset.
pub fn enumerate(token: &str, routing: &NetworkRouting) -> Vec<Strategy> {
    let stable = routing.stable_token.as_str();
    let mut result = Vec::new();
    for tier in &routing.fee_tiers {
        result.push(Strategy {
            id: format!("v3-direct-{tier}"),
            path: SwapPath::direct(token, stable, PoolKind::Concentrated(*tier)),
        });
    }
    if routing.constant_product {
        result.push(Strategy {
            id: "v2-direct".to_string(),
            path: SwapPath::direct(token, stable, PoolKind::ConstantProduct),
        });
    }
    let via = match &routing.intermediate {
        Some((address, label)) if !address.eq_ignore_ascii_case(token) => Some((address.as_str(), label.as_str())),
        _ => None,
    };
    if let Some((via, label)) = via {
        for first in &routing.fee_tiers {
            for second in &routing.fee_tiers {
                result.push(Strategy {
                    id: format!("v3-via-{label}-{first}-{second}"),
                    path: SwapPath::two_hop(
                        token,
                        via,
                        stable,
                        PoolKind::Concentrated(*first),
                        PoolKind::Concentrated(*second),
                    ),
                });
            }
        }
        if routing.constant_product {
            result.push(Strategy {
                id: format!("v2-via-{label}"),
                path: SwapPath::two_hop(token, via, stable, PoolKind::ConstantProduct, PoolKind::ConstantProduct),
            });
        }
    }
    result
}
