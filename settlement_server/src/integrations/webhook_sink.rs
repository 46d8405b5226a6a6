use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use log::*;
use settlement_engine::{
    helpers::SignedPayload,
    traits::{WebhookError, WebhookSink},
};

use super::{ApiClient, ApiClientError};
use crate::config::EndpointConfig;

/// Delivers signed notifications to the webhook URL each business has registered.
pub struct HttpWebhookSink {
    endpoints: HashMap<String, ApiClient>,
}

impl HttpWebhookSink {
    pub fn new(endpoints: &HashMap<String, String>, timeout: Duration) -> Result<Self, ApiClientError> {
        let endpoints = endpoints
            .iter()
            .map(|(business, url)| Ok((business.clone(), ApiClient::new(&EndpointConfig::new(url), timeout)?)))
            .collect::<Result<HashMap<_, _>, ApiClientError>>()?;
        info!("🪝️ Webhooks are registered for {} businesses", endpoints.len());
        Ok(Self { endpoints })
    }
}

#[async_trait]
impl WebhookSink for HttpWebhookSink {
    async fn deliver(&self, business_id: &str, payload: SignedPayload) -> Result<(), WebhookError> {
        let client = self.endpoints.get(business_id).ok_or_else(|| WebhookError::NoEndpoint(business_id.to_string()))?;
        client.send_signed("", &payload).await.map_err(|e| WebhookError::DeliveryFailed(e.to_string()))?;
        Ok(())
    }
}
