//! # Single-owner provider allocation
//!
//! Every settlement is funded in full by exactly one liquidity provider. Balances are never aggregated across
//! providers: two providers holding 60 each cannot fund a requirement of 100.
//!
//! Among the providers that can fund the requirement on their own, the highest [`ScoringConfig::score`] wins. Ties go
//! to the provider that appears first in the roster.
//!
//! Roster failures resolve to [`LiquidityDecision::Insufficient`]. The only way to get
//! [`LiquidityDecision::AssumedAvailable`] is to run without roster credentials, which is an explicit, degraded mode.
mod scoring;

use std::{sync::Arc, time::Duration};

use log::*;
use rust_decimal::Decimal;
pub use scoring::ScoringConfig;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;

use crate::{
    db_types::Network,
    traits::{ProviderRoster, ProviderRosterError},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderMatch {
    pub provider_id: String,
    pub provider_name: String,
    pub balance: Decimal,
    pub score: Decimal,
    /// balance / required
    pub liquidity_ratio: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LiquidityDecision {
    Capable(ProviderMatch),
    /// No single provider can fund the requirement. `max_available` is the largest single balance, when known.
    Insufficient { max_available: Option<Decimal> },
    /// The roster is administratively disabled, and liquidity is assumed to be available.
    AssumedAvailable,
}

impl LiquidityDecision {
    pub fn is_fundable(&self) -> bool {
        !matches!(self, LiquidityDecision::Insufficient { .. })
    }

    pub fn provider(&self) -> Option<&ProviderMatch> {
        match self {
            LiquidityDecision::Capable(m) => Some(m),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct ProviderMatcher {
    roster: Option<Arc<dyn ProviderRoster>>,
    scoring: ScoringConfig,
    roster_timeout: Duration,
}

impl ProviderMatcher {
    pub fn new(roster: Option<Arc<dyn ProviderRoster>>, scoring: ScoringConfig) -> Self {
        Self { roster, scoring, roster_timeout: Duration::from_secs(10) }
    }

    pub fn with_roster_timeout(mut self, roster_timeout: Duration) -> Self {
        self.roster_timeout = roster_timeout;
        self
    }

    /// Finds the provider that should fund `required` on `network`. Roster errors are converted into the safe
    /// "insufficient" decision.
    pub async fn find_capable_provider(&self, network: Network, required: Decimal) -> LiquidityDecision {
        match self.evaluate(network, required).await {
            Ok(decision) => decision,
            Err(e) => {
                warn!("🏦️ Provider roster for {network} is unavailable ({e}). Reporting no liquidity.");
                LiquidityDecision::Insufficient { max_available: None }
            },
        }
    }

    /// Like [`Self::find_capable_provider`], but surfaces roster errors so that callers (the liquidity cache) can
    /// decide on a fallback.
    pub async fn evaluate(&self, network: Network, required: Decimal) -> Result<LiquidityDecision, ProviderRosterError> {
        let Some(roster) = &self.roster else {
            warn!("🏦️ No provider roster is configured. Assuming liquidity is available on {network}.");
            return Ok(LiquidityDecision::AssumedAvailable);
        };
        if required <= Decimal::ZERO {
            error!("🏦️ Asked to match a non-positive requirement of {required} on {network}");
            return Ok(LiquidityDecision::Insufficient { max_available: None });
        }
        let providers = match timeout(self.roster_timeout, roster.fetch_providers(network)).await {
            Err(_) => return Err(ProviderRosterError::Timeout),
            Ok(Err(ProviderRosterError::NotConfigured)) => {
                warn!("🏦️ The provider roster has no credentials. Assuming liquidity is available on {network}.");
                return Ok(LiquidityDecision::AssumedAvailable);
            },
            Ok(Err(e)) => return Err(e),
            Ok(Ok(p)) => p,
        };
        let mut best: Option<ProviderMatch> = None;
        let mut max_available: Option<Decimal> = None;
        for provider in providers.iter().filter(|p| p.active) {
            let balance = provider.balance_on(network);
            max_available = Some(max_available.map_or(balance, |m| m.max(balance)));
            if balance < required {
                trace!("🏦️ {} holds {balance} on {network}, which is less than {required}", provider.id);
                continue;
            }
            let score = self.scoring.score(balance, required, provider.verified);
            trace!("🏦️ {} holds {balance} on {network} and scores {score}", provider.id);
            if best.as_ref().map(|b| score > b.score).unwrap_or(true) {
                best = Some(ProviderMatch {
                    provider_id: provider.id.clone(),
                    provider_name: provider.name.clone(),
                    balance,
                    score,
                    liquidity_ratio: balance / required,
                });
            }
        }
        match best {
            Some(m) => {
                debug!("🏦️ {} will fund {required} on {network} (score {})", m.provider_id, m.score);
                Ok(LiquidityDecision::Capable(m))
            },
            None => {
                info!(
                    "🏦️ No single provider can fund {required} on {network}. Largest balance: {}",
                    max_available.map(|m| m.to_string()).unwrap_or_else(|| "none".into())
                );
                Ok(LiquidityDecision::Insufficient { max_available })
            },
        }
    }
}
