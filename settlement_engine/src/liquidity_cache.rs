//! # Liquidity cache
//!
//! A short-lived, advisory cache in front of the [`ProviderMatcher`]. Entries are keyed on the network and the
//! required amount rounded to two decimal places, and live for [`LiquidityCacheConfig::ttl`].
//!
//! The cache must never hide a shortfall on a large order:
//! * requirements above `large_order_threshold` always go to the roster,
//! * only successful matches at or below `cacheable_ceiling` are written,
//! * a stale entry is only served when the roster is failing, and is flagged as [`LiquiditySource::StaleFallback`].
//!
//! Concurrent writers simply overwrite each other.
use std::time::Duration;

use dashmap::DashMap;
use log::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::{
    db_types::Network,
    provider_matcher::{LiquidityDecision, ProviderMatcher},
};

/// Where a liquidity decision came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiquiditySource {
    /// Fresh from the provider roster
    Live,
    /// From a cache entry younger than the TTL
    Cached,
    /// From an expired cache entry, because the roster is failing
    StaleFallback,
    /// The roster is not configured and liquidity was assumed
    Degraded,
    /// The roster failed and there was nothing to fall back on
    Unavailable,
    /// The network is not liquidity-constrained, or checks are disabled
    Skipped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LiquidityCheck {
    pub decision: LiquidityDecision,
    pub source: LiquiditySource,
}

#[derive(Debug, Clone)]
pub struct LiquidityCacheConfig {
    pub ttl: Duration,
    /// Requirements above this amount are always validated live
    pub large_order_threshold: Decimal,
    /// Only successful checks at or below this amount are cached
    pub cacheable_ceiling: Decimal,
    /// How old an entry may be and still serve as a fallback during a roster outage
    pub stale_window: Duration,
}

impl Default for LiquidityCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60),
            large_order_threshold: dec!(10_000),
            cacheable_ceiling: dec!(5_000),
            stale_window: Duration::from_secs(600),
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    decision: LiquidityDecision,
    stored_at: Instant,
}

pub struct LiquidityCache {
    matcher: ProviderMatcher,
    config: LiquidityCacheConfig,
    entries: DashMap<(Network, Decimal), CacheEntry>,
}

impl LiquidityCache {
    pub fn new(matcher: ProviderMatcher, config: LiquidityCacheConfig) -> Self {
        Self { matcher, config, entries: DashMap::new() }
    }

    pub fn config(&self) -> &LiquidityCacheConfig {
        &self.config
    }

    pub fn matcher(&self) -> &ProviderMatcher {
        &self.matcher
    }

    fn key(network: Network, amount: Decimal) -> (Network, Decimal) {
        (network, amount.round_dp(2).normalize())
    }

    /// Returns a liquidity decision for `amount` of settlement stablecoin on `network`.
    pub async fn get(&self, network: Network, amount: Decimal) -> LiquidityCheck {
        let key = Self::key(network, amount);
        let large = amount > self.config.large_order_threshold;
        if large {
            trace!("🗄️ {amount} on {network} is a large order. Bypassing the cache.");
        } else if let Some(decision) = self.fresh_entry(&key) {
            trace!("🗄️ Cache hit for {amount} on {network}");
            return LiquidityCheck { decision, source: LiquiditySource::Cached };
        }
        match self.matcher.evaluate(network, amount).await {
            Ok(LiquidityDecision::AssumedAvailable) => {
                LiquidityCheck { decision: LiquidityDecision::AssumedAvailable, source: LiquiditySource::Degraded }
            },
            Ok(decision) => {
                if matches!(decision, LiquidityDecision::Capable(_)) && amount <= self.config.cacheable_ceiling {
                    self.entries.insert(key, CacheEntry { decision: decision.clone(), stored_at: Instant::now() });
                }
                LiquidityCheck { decision, source: LiquiditySource::Live }
            },
            Err(e) => match self.stale_entry(&key).filter(|_| !large) {
                Some(decision) => {
                    warn!("🗄️ Provider roster failed ({e}). Serving a stale decision for {amount} on {network}.");
                    LiquidityCheck { decision, source: LiquiditySource::StaleFallback }
                },
                None => {
                    warn!("🗄️ Provider roster failed ({e}) and there is no fallback for {amount} on {network}");
                    LiquidityCheck {
                        decision: LiquidityDecision::Insufficient { max_available: None },
                        source: LiquiditySource::Unavailable,
                    }
                },
            },
        }
    }

    fn fresh_entry(&self, key: &(Network, Decimal)) -> Option<LiquidityDecision> {
        self.entries
            .get(key)
            .filter(|e| e.stored_at.elapsed() < self.config.ttl)
            .map(|e| e.decision.clone())
    }

    fn stale_entry(&self, key: &(Network, Decimal)) -> Option<LiquidityDecision> {
        self.entries
            .get(key)
            .filter(|e| e.stored_at.elapsed() < self.config.stale_window)
            .map(|e| e.decision.clone())
    }

    /// Drops entries that are too old to be used even as a fallback.
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.stored_at.elapsed() < self.config.stale_window);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
