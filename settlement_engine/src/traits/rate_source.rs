use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum RateSourceError {
    #[error("The rate source could not be reached: {0}")]
    Unavailable(String),
    #[error("The rate source reported a failure: {0}")]
    Rejected(String),
    #[error("The rate source returned an invalid rate: {0}")]
    InvalidRate(String),
    #[error("The rate source did not respond within {0}s")]
    Timeout(u64),
}

/// A source for the price of one unit of settlement stablecoin, in fiat.
#[async_trait]
pub trait RateSource: Send + Sync {
    /// A short label used in logs
    fn name(&self) -> &str;

    async fn fetch_stable_rate(&self) -> Result<Decimal, RateSourceError>;
}
