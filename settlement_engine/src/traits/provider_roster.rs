use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::Network;

#[derive(Debug, Clone, Error)]
pub enum ProviderRosterError {
    #[error("The provider roster could not be reached: {0}")]
    Unavailable(String),
    #[error("The provider roster returned an invalid response: {0}")]
    InvalidResponse(String),
    #[error("The provider roster did not respond in time")]
    Timeout,
    /// No credentials have been configured for the roster. This is an administrative choice, not an outage.
    #[error("The provider roster is not configured")]
    NotConfigured,
}

/// A liquidity provider, as reported by the roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub balances: HashMap<Network, Decimal>,
    pub verified: bool,
    pub active: bool,
}

impl Provider {
    /// The provider's settlement-stable balance on `network`. Missing networks have a zero balance.
    pub fn balance_on(&self, network: Network) -> Decimal {
        self.balances.get(&network).copied().unwrap_or_default()
    }
}

#[async_trait]
pub trait ProviderRoster: Send + Sync {
    /// Fetches the active providers that operate on `network`, in the roster's order.
    async fn fetch_providers(&self, network: Network) -> Result<Vec<Provider>, ProviderRosterError>;
}
