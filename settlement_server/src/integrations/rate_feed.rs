use async_trait::async_trait;
use log::*;
use rust_decimal::Decimal;
use serde::Deserialize;
use settlement_engine::traits::{RateSource, RateSourceError};

use super::{ApiClient, ApiClientError};

/// The body returned by a rate feed
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateFeedResponse {
    pub success: bool,
    #[serde(default)]
    pub unit_price_in_fiat: Option<Decimal>,
    #[serde(default)]
    pub message: Option<String>,
}

impl RateFeedResponse {
    pub fn into_rate(self) -> Result<Decimal, RateSourceError> {
        if !self.success {
            let reason = self.message.unwrap_or_else(|| "no reason given".to_string());
            return Err(RateSourceError::Rejected(reason));
        }
        match self.unit_price_in_fiat {
            Some(rate) if rate > Decimal::ZERO => Ok(rate),
            Some(rate) => Err(RateSourceError::InvalidRate(rate.to_string())),
            None => Err(RateSourceError::InvalidRate("missing unitPriceInFiat".to_string())),
        }
    }
}

/// Fetches the fiat price of one unit of settlement stablecoin with a `GET` on the feed's URL.
pub struct HttpRateSource {
    name: String,
    client: ApiClient,
}

impl HttpRateSource {
    pub fn new(name: &str, client: ApiClient) -> Self {
        Self { name: name.to_string(), client }
    }
}

#[async_trait]
impl RateSource for HttpRateSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_stable_rate(&self) -> Result<Decimal, RateSourceError> {
        let response = self.client.get::<RateFeedResponse>("", &[]).await.map_err(|e| match e {
            ApiClientError::Timeout => RateSourceError::Timeout(self.client.timeout().as_secs()),
            ApiClientError::JsonError(e) => RateSourceError::InvalidRate(e),
            e => RateSourceError::Unavailable(e.to_string()),
        })?;
        let rate = response.into_rate()?;
        trace!("💱️ {} quotes {rate}", self.name);
        Ok(rate)
    }
}
