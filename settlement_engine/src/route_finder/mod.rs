//! # Route discovery
//!
//! The route finder answers one question: how much settlement stablecoin is a given amount of a token worth on a
//! given network, and by which route?
//!
//! * On networks where prices are discovered on-chain, every strategy from [`strategies::enumerate`] is probed
//!   concurrently. A strategy that fails or times out is treated as "no liquidity on this path" and never aborts the
//!   search. The strategy with the numerically largest output wins, whatever its position in the list.
//! * On aggregator-routed networks a single aggregator call returns the optimised route.
//! * The settlement stablecoin itself converts 1:1 on every network, without any route search.
//!
//! Tokens that are not on a network's reserve allow-list are rejected before any probe is sent.
mod config;
pub mod strategies;

use std::sync::Arc;

pub use config::{NetworkRouting, RouteFinderConfig};
use futures::future::join_all;
use log::*;
use rust_decimal::Decimal;
use strategies::Strategy;
use thiserror::Error;
use tokio::time::timeout;

use crate::{
    db_types::{Network, RoutingMode},
    quote_objects::{NetworkQuote, RouteQuote},
    token_registry::TokenConfig,
    traits::{AggregatorClient, AggregatorError, AggregatorQuoteRequest, ChainQuoteError, ChainQuoter},
};

#[derive(Debug, Clone, Error)]
pub enum RouteError {
    #[error("{token} is not supported on {network}")]
    TokenNotSupported { token: String, network: Network },
    #[error("There is no liquidity for {token} on {network}")]
    NoLiquidity { token: String, network: Network },
    #[error("Routing is not configured for {0}")]
    NotConfigured(Network),
    #[error("Route discovery failed upstream: {0}")]
    Upstream(String),
}

impl RouteError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, RouteError::Upstream(_))
    }
}

#[derive(Clone)]
pub struct RouteFinder {
    chain: Option<Arc<dyn ChainQuoter>>,
    aggregator: Option<Arc<dyn AggregatorClient>>,
    config: RouteFinderConfig,
}

impl RouteFinder {
    pub fn new(
        chain: Option<Arc<dyn ChainQuoter>>,
        aggregator: Option<Arc<dyn AggregatorClient>>,
        config: RouteFinderConfig,
    ) -> Self {
        Self { chain, aggregator, config }
    }

    pub fn config(&self) -> &RouteFinderConfig {
        &self.config
    }

    /// Quotes `amount` of `token` on `network` in settlement stablecoin.
    ///
    /// Unsized quotes do not measure price impact, so `pool_liquidity_adequate` only reflects that a route exists.
    /// Use [`Self::quote_for_settlement`] when the size of the trade matters.
    pub async fn quote(&self, token: &TokenConfig, network: Network, amount: Decimal) -> Result<RouteQuote, RouteError> {
        self.ensure_token_on_network(token, network)?;
        if token.settlement_equivalent {
            trace!("🧭️ {} is the settlement asset on {network}. Identity conversion.", token.symbol);
            return Ok(RouteQuote::identity(amount));
        }
        match network.routing_mode() {
            RoutingMode::Aggregator => self.aggregator_quote(token, network, amount).await,
            RoutingMode::OnChainPools => self.best_on_chain_quote(token, network, amount).await,
        }
    }

    /// Finds the token amount worth `stable_amount` of settlement stablecoin.
    ///
    /// The unit price is probed first, the token amount is sized from it, and the route is re-quoted at full size.
    /// The resulting quote is flagged as adequate when the price impact of the full-size trade stays within
    /// [`RouteFinderConfig::max_price_impact`]. A full-size quote that fails outright marks the pool as inadequate.
    pub async fn quote_for_settlement(
        &self,
        token: &TokenConfig,
        network: Network,
        stable_amount: Decimal,
    ) -> Result<RouteQuote, RouteError> {
        self.ensure_token_on_network(token, network)?;
        if token.settlement_equivalent {
            return Ok(RouteQuote::identity(stable_amount));
        }
        let unit = self.quote(token, network, Decimal::ONE).await?;
        let unit_price = unit.price_per_unit;
        if unit_price <= Decimal::ZERO {
            return Err(RouteError::NoLiquidity { token: token.symbol.clone(), network });
        }
        let token_amount = (stable_amount / unit_price).round_dp(token.decimals.min(18));
        let sized = match self.quote(token, network, token_amount).await {
            Ok(sized) => sized,
            Err(RouteError::NoLiquidity { .. }) => {
                warn!(
                    "🧭️ A route for 1 {} exists on {network}, but none can absorb {token_amount}. Flagging the pool as \
                     inadequate.",
                    token.symbol
                );
                return Ok(RouteQuote {
                    price_per_unit: unit_price,
                    total_output: token_amount * unit_price,
                    token_amount,
                    route_id: unit.route_id,
                    pool_liquidity_adequate: false,
                    detail: unit.detail,
                });
            },
            Err(e) => return Err(e),
        };
        let impact = match &sized.detail {
            NetworkQuote::Aggregator { price_impact, .. } => *price_impact,
            _ => {
                let realised = if token_amount.is_zero() { unit_price } else { sized.total_output / token_amount };
                ((unit_price - realised) / unit_price).max(Decimal::ZERO)
            },
        };
        let adequate = impact <= self.config.max_price_impact;
        if !adequate {
            warn!(
                "🧭️ Price impact of {impact} for {token_amount} {} on {network} exceeds the maximum of {}",
                token.symbol, self.config.max_price_impact
            );
        }
        let detail = match sized.detail {
            NetworkQuote::OnChain { strategy, .. } => NetworkQuote::OnChain { strategy, price_impact: Some(impact) },
            other => other,
        };
        Ok(RouteQuote {
            price_per_unit: unit_price,
            total_output: sized.total_output,
            token_amount,
            route_id: sized.route_id,
            pool_liquidity_adequate: adequate,
            detail,
        })
    }

    fn ensure_token_on_network(&self, token: &TokenConfig, network: Network) -> Result<(), RouteError> {
        if token.network != network {
            return Err(RouteError::TokenNotSupported { token: token.symbol.clone(), network });
        }
        Ok(())
    }

    async fn aggregator_quote(
        &self,
        token: &TokenConfig,
        network: Network,
        amount: Decimal,
    ) -> Result<RouteQuote, RouteError> {
        let aggregator = self.aggregator.as_ref().ok_or(RouteError::NotConfigured(network))?;
        let routing = self.config.routing(network).ok_or(RouteError::NotConfigured(network))?;
        let request = AggregatorQuoteRequest {
            network,
            input_token: token.contract_address.clone(),
            output_token: routing.stable_token.clone(),
            amount,
        };
        let response = timeout(self.config.aggregator_timeout, aggregator.quote(request))
            .await
            .map_err(|_| AggregatorError::Timeout)
            .and_then(|r| r);
        let quote = match response {
            Ok(q) => q,
            Err(AggregatorError::NoRoute(reason)) => {
                debug!("🧭️ Aggregator found no route for {} on {network}: {reason}", token.symbol);
                return Err(RouteError::NoLiquidity { token: token.symbol.clone(), network });
            },
            Err(e) => {
                warn!("🧭️ Aggregator quote for {} on {network} failed: {e}", token.symbol);
                return Err(RouteError::Upstream(e.to_string()));
            },
        };
        if quote.output_amount <= Decimal::ZERO || amount <= Decimal::ZERO {
            return Err(RouteError::NoLiquidity { token: token.symbol.clone(), network });
        }
        let route_id = if quote.route_steps.is_empty() {
            "aggregator".to_string()
        } else {
            format!("aggregator:{}", quote.route_steps.join(">"))
        };
        debug!("🧭️ Aggregator quoted {amount} {} on {network} at {} via {route_id}", token.symbol, quote.output_amount);
        Ok(RouteQuote {
            price_per_unit: quote.output_amount / amount,
            total_output: quote.output_amount,
            token_amount: amount,
            route_id,
            pool_liquidity_adequate: quote.price_impact <= self.config.max_price_impact,
            detail: NetworkQuote::Aggregator { price_impact: quote.price_impact, route_steps: quote.route_steps },
        })
    }

    async fn best_on_chain_quote(
        &self,
        token: &TokenConfig,
        network: Network,
        amount: Decimal,
    ) -> Result<RouteQuote, RouteError> {
        let chain = self.chain.as_ref().ok_or(RouteError::NotConfigured(network))?;
        let routing = self.config.routing(network).ok_or(RouteError::NotConfigured(network))?;
        let supported = timeout(self.config.probe_timeout, chain.is_token_supported(network, &token.contract_address))
            .await
            .map_err(|_| ChainQuoteError::Timeout)
            .and_then(|r| r)
            .map_err(|e| {
                warn!("🧭️ Could not check whether {} is supported on {network}: {e}", token.symbol);
                RouteError::Upstream(e.to_string())
            })?;
        if !supported {
            info!("🧭️ {} ({}) is not on the {network} allow-list", token.symbol, token.contract_address);
            return Err(RouteError::TokenNotSupported { token: token.symbol.clone(), network });
        }
        let strategies = strategies::enumerate(&token.contract_address, routing);
        trace!("🧭️ Probing {} strategies for {amount} {} on {network}", strategies.len(), token.symbol);
        let probes = strategies.iter().map(|s| self.probe(chain.as_ref(), network, s, amount));
        let results = join_all(probes).await;
        let mut best: Option<(&Strategy, Decimal)> = None;
        for (strategy, result) in strategies.iter().zip(results) {
            match result {
                Ok(output) if output > Decimal::ZERO => {
                    trace!("🧭️ {} returned {output}", strategy.id);
                    // Strictly greater, so equal outputs keep the earlier strategy
                    if best.map(|(_, b)| output > b).unwrap_or(true) {
                        best = Some((strategy, output));
                    }
                },
                Ok(_) => debug!("🧭️ {} returned no output for {}", strategy.id, token.symbol),
                Err(e) => debug!("🧭️ {} has no liquidity for {}: {e}", strategy.id, token.symbol),
            }
        }
        let (strategy, output) = best.ok_or_else(|| {
            info!("🧭️ All {} strategies for {} on {network} came up empty", strategies.len(), token.symbol);
            RouteError::NoLiquidity { token: token.symbol.clone(), network }
        })?;
        if amount <= Decimal::ZERO {
            return Err(RouteError::NoLiquidity { token: token.symbol.clone(), network });
        }
        debug!("🧭️ Best route for {amount} {} on {network} is {} with {output}", token.symbol, strategy.id);
        Ok(RouteQuote {
            price_per_unit: output / amount,
            total_output: output,
            token_amount: amount,
            route_id: strategy.id.clone(),
            pool_liquidity_adequate: true,
            detail: NetworkQuote::OnChain { strategy: strategy.id.clone(), price_impact: None },
        })
    }

    async fn probe(
        &self,
        chain: &dyn ChainQuoter,
        network: Network,
        strategy: &Strategy,
        amount: Decimal,
    ) -> Result<Decimal, ChainQuoteError> {
        timeout(self.config.probe_timeout, chain.quote(network, &strategy.path, amount))
            .await
            .map_err(|_| ChainQuoteError::Timeout)?
    }
}
