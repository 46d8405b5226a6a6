use std::{collections::HashMap, str::FromStr};

use async_trait::async_trait;
use log::*;
use rust_decimal::Decimal;
use serde::Deserialize;
use settlement_engine::{
    db_types::Network,
    traits::{Provider, ProviderRoster, ProviderRosterError},
};

use super::{ApiClient, ApiClientError};

/// A provider as the roster service describes it. Balances are keyed by network name.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub per_network_balance: HashMap<String, Decimal>,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub active: bool,
}

impl From<RosterEntry> for Provider {
    fn from(entry: RosterEntry) -> Self {
        let balances = entry
            .per_network_balance
            .into_iter()
            .filter_map(|(network, balance)| match Network::from_str(&network) {
                Ok(n) => Some((n, balance)),
                Err(_) => {
                    trace!("🏦️ Ignoring balance on unknown network {network} for provider {}", entry.id);
                    None
                },
            })
            .collect();
        Provider { id: entry.id, name: entry.name, balances, verified: entry.verified, active: entry.active }
    }
}

/// The liquidity-provider roster, reached with `GET /providers?network=..&active=true`.
///
/// Unverified providers are included. The matcher ranks them below verified providers.
pub struct HttpProviderRoster {
    client: ApiClient,
}

impl HttpProviderRoster {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProviderRoster for HttpProviderRoster {
    async fn fetch_providers(&self, network: Network) -> Result<Vec<Provider>, ProviderRosterError> {
        let params = [("network", network.as_str()), ("active", "true")];
        let entries = self.client.get::<Vec<RosterEntry>>("providers", &params).await.map_err(|e| match e {
            ApiClientError::Timeout => ProviderRosterError::Timeout,
            ApiClientError::JsonError(e) => ProviderRosterError::InvalidResponse(e),
            e => ProviderRosterError::Unavailable(e.to_string()),
        })?;
        debug!("🏦️ The roster lists {} providers on {network}", entries.len());
        Ok(entries.into_iter().map(Provider::from).collect())
    }
}
