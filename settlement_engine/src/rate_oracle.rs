//! # Stablecoin/fiat rate resolution
//!
//! The rate oracle walks a fixed fallback chain until it finds a usable rate:
//!
//! 1. the primary rate source (10s timeout),
//! 2. the secondary, dedicated rate source (5s timeout),
//! 3. a static rate taken from configuration,
//! 4. a hard-coded emergency constant.
//!
//! [`RateOracle::stable_to_fiat_rate`] therefore never fails. The tier that produced the rate is carried along in
//! [`StableRate::tier`] so that every order records how its price was derived.
use std::{sync::Arc, time::Duration};

use log::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::{
    quote_objects::{RateTier, StableRate},
    traits::{RateSource, RateSourceError},
};

pub const DEFAULT_EMERGENCY_RATE: Decimal = dec!(1600);

#[derive(Debug, Clone)]
pub struct RateOracleConfig {
    pub primary_timeout: Duration,
    pub secondary_timeout: Duration,
    pub static_rate: Option<Decimal>,
    pub emergency_rate: Decimal,
}

impl Default for RateOracleConfig {
    fn default() -> Self {
        Self {
            primary_timeout: Duration::from_secs(10),
            secondary_timeout: Duration::from_secs(5),
            static_rate: None,
            emergency_rate: DEFAULT_EMERGENCY_RATE,
        }
    }
}

impl RateOracleConfig {
    pub fn with_static_rate(mut self, rate: Option<Decimal>) -> Self {
        self.static_rate = rate;
        self
    }

    /// Non-positive rates are rejected, and the current emergency rate is kept.
    pub fn with_emergency_rate(mut self, rate: Decimal) -> Self {
        if is_usable(rate) {
            self.emergency_rate = rate;
        } else {
            warn!("💱️ Ignoring emergency rate {rate}. It must be positive. Keeping {}", self.emergency_rate);
        }
        self
    }

    pub fn with_timeouts(mut self, primary: Duration, secondary: Duration) -> Self {
        self.primary_timeout = primary;
        self.secondary_timeout = secondary;
        self
    }
}

#[derive(Clone)]
pub struct RateOracle {
    primary: Option<Arc<dyn RateSource>>,
    secondary: Option<Arc<dyn RateSource>>,
    config: RateOracleConfig,
}

impl RateOracle {
    pub fn new(
        primary: Option<Arc<dyn RateSource>>,
        secondary: Option<Arc<dyn RateSource>>,
        config: RateOracleConfig,
    ) -> Self {
        Self { primary, secondary, config }
    }

    /// An oracle with no live sources. It always answers from configuration.
    pub fn offline(config: RateOracleConfig) -> Self {
        Self::new(None, None, config)
    }

    pub fn config(&self) -> &RateOracleConfig {
        &self.config
    }

    /// Fiat per unit of settlement stablecoin.
    pub async fn stable_to_fiat_rate(&self) -> StableRate {
        if let Some(source) = &self.primary {
            match fetch_with_timeout(source.as_ref(), self.config.primary_timeout).await {
                Ok(rate) => {
                    trace!("💱️ Primary rate source '{}' quoted {rate}", source.name());
                    return StableRate::new(rate, RateTier::Primary);
                },
                Err(e) => warn!("💱️ Primary rate source '{}' failed: {e}. Falling back.", source.name()),
            }
        }
        if let Some(source) = &self.secondary {
            match fetch_with_timeout(source.as_ref(), self.config.secondary_timeout).await {
                Ok(rate) => {
                    warn!("💱️ Using secondary rate source '{}': {rate}", source.name());
                    return StableRate::new(rate, RateTier::Secondary);
                },
                Err(e) => warn!("💱️ Secondary rate source '{}' failed: {e}. Falling back.", source.name()),
            }
        }
        if let Some(rate) = self.config.static_rate.filter(|r| is_usable(*r)) {
            warn!("💱️ Using the configured static rate: {rate}");
            return StableRate::new(rate, RateTier::Static);
        }
        let rate = Some(self.config.emergency_rate).filter(|r| is_usable(*r)).unwrap_or(DEFAULT_EMERGENCY_RATE);
        error!("💱️ No rate source is available. Using the emergency rate of {rate}");
        StableRate::new(rate, RateTier::Emergency)
    }
}

fn is_usable(rate: Decimal) -> bool {
    rate > Decimal::ZERO
}

async fn fetch_with_timeout(source: &dyn RateSource, limit: Duration) -> Result<Decimal, RateSourceError> {
    let rate = tokio::time::timeout(limit, source.fetch_stable_rate())
        .await
        .map_err(|_| RateSourceError::Timeout(limit.as_secs()))??;
    if rate <= Decimal::ZERO {
        return Err(RateSourceError::InvalidRate(rate.to_string()));
    }
    Ok(rate)
}
