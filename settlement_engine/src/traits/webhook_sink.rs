use async_trait::async_trait;
use thiserror::Error;

use crate::helpers::SignedPayload;

#[derive(Debug, Clone, Error)]
pub enum WebhookError {
    #[error("No webhook endpoint is registered for business {0}")]
    NoEndpoint(String),
    #[error("Webhook delivery failed: {0}")]
    DeliveryFailed(String),
    #[error("Could not serialize the webhook payload: {0}")]
    Serialization(String),
}

/// Delivers a signed notification to a business. Delivery is best-effort; retries are the sink's own concern.
#[async_trait]
pub trait WebhookSink: Send + Sync {
    async fn deliver(&self, business_id: &str, payload: SignedPayload) -> Result<(), WebhookError>;
}
