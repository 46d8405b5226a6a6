//! HTTP clients for the external collaborators of the engine.
//!
//! Each client implements one of the collaborator traits in [`settlement_engine::traits`] on top of a shared
//! [`ApiClient`]. Wire formats use camelCase JSON.
mod aggregator;
mod api_client;
mod chain_quoter;
mod payment_gateway;
mod provider_roster;
mod rate_feed;
mod settlement_executor;
mod webhook_sink;

use std::sync::Arc;

pub use aggregator::HttpAggregator;
pub use api_client::{ApiClient, ApiClientError};
pub use chain_quoter::HttpChainQuoter;
use log::*;
pub use payment_gateway::HttpPaymentGateway;
pub use provider_roster::HttpProviderRoster;
pub use rate_feed::HttpRateSource;
use settlement_engine::{
    traits::{AggregatorClient, ChainQuoter, ProviderRoster, RateSource, WebhookSink},
    Collaborators,
    LiquidityCache,
    LiquidityCacheConfig,
    ProviderMatcher,
    RateOracle,
    RouteFinder,
    RouteFinderConfig,
    ScoringConfig,
    TokenRegistry,
};
pub use settlement_executor::HttpSettlementExecutor;
pub use webhook_sink::HttpWebhookSink;

use crate::{
    config::{EndpointConfig, ServerConfig},
    errors::ServerError,
};

fn client_for(endpoint: &EndpointConfig, config: &ServerConfig) -> Result<ApiClient, ServerError> {
    ApiClient::new(endpoint, config.integrations.timeout).map_err(|e| ServerError::InitializeError(e.to_string()))
}

fn optional_client(endpoint: &Option<EndpointConfig>, config: &ServerConfig) -> Result<Option<ApiClient>, ServerError> {
    endpoint.as_ref().map(|e| client_for(e, config)).transpose()
}

pub fn load_token_registry(config: &ServerConfig) -> Result<TokenRegistry, ServerError> {
    match &config.token_registry {
        Some(path) => {
            let registry = TokenRegistry::from_file(path).map_err(|e| {
                ServerError::ConfigurationError(format!("Could not load the token registry at {}. {e}", path.display()))
            })?;
            info!("🪛️ Loaded {} tokens from {}", registry.len(), path.display());
            Ok(registry)
        },
        None => Ok(TokenRegistry::builtin()),
    }
}

/// Builds every stateless collaborator of the order coordinator from the server configuration.
///
/// The settlement executor and the payment gateway are mandatory. Every other collaborator is optional and degrades
/// the engine as described in [`crate::config::IntegrationsConfig`].
pub fn build_collaborators(config: &ServerConfig) -> Result<Collaborators, ServerError> {
    let integrations = &config.integrations;
    let registry = load_token_registry(config)?;

    let primary = optional_client(&integrations.primary_rate, config)?
        .map(|c| Arc::new(HttpRateSource::new("primary", c)) as Arc<dyn RateSource>);
    let secondary = optional_client(&integrations.secondary_rate, config)?
        .map(|c| Arc::new(HttpRateSource::new("secondary", c)) as Arc<dyn RateSource>);
    let rates = RateOracle::new(primary, secondary, config.rates.clone());

    let chain = optional_client(&integrations.chain_quoter, config)?
        .map(|c| Arc::new(HttpChainQuoter::new(c)) as Arc<dyn ChainQuoter>);
    let aggregator = optional_client(&integrations.aggregator, config)?
        .map(|c| Arc::new(HttpAggregator::new(c)) as Arc<dyn AggregatorClient>);
    let routes = RouteFinder::new(chain, aggregator, RouteFinderConfig::default());

    let roster = optional_client(&integrations.provider_roster, config)?
        .map(|c| Arc::new(HttpProviderRoster::new(c)) as Arc<dyn ProviderRoster>);
    let liquidity =
        LiquidityCache::new(ProviderMatcher::new(roster, ScoringConfig::default()), LiquidityCacheConfig::default());

    let executor = integrations.settlement_executor.as_ref().ok_or_else(|| {
        ServerError::ConfigurationError("SRE_SETTLEMENT_EXECUTOR_URL must be set.".to_string())
    })?;
    let executor = Arc::new(HttpSettlementExecutor::new(client_for(executor, config)?));
    let payments = integrations
        .payment_gateway
        .as_ref()
        .ok_or_else(|| ServerError::ConfigurationError("SRE_PAYMENT_GATEWAY_URL must be set.".to_string()))?;
    let payments = Arc::new(HttpPaymentGateway::new(client_for(payments, config)?));

    Ok(Collaborators { registry, rates, routes, liquidity, payments, executor })
}

pub fn build_webhook_sink(config: &ServerConfig) -> Result<Arc<dyn WebhookSink>, ServerError> {
    let sink = HttpWebhookSink::new(&config.integrations.business_webhooks, config.integrations.timeout)
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    Ok(Arc::new(sink))
}
