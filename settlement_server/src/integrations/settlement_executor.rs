use async_trait::async_trait;
use serde::Deserialize;
use settlement_engine::{
    helpers::SignedPayload,
    traits::{SettlementExecutor, SettlementExecutorError, SettlementReceipt},
};

use super::{ApiClient, ApiClientError};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DispatchResult {
    settlement_reference: String,
}

fn executor_error(e: ApiClientError) -> SettlementExecutorError {
    match e {
        ApiClientError::Timeout => SettlementExecutorError::Timeout,
        ApiClientError::QueryError { status, message } if (400..500).contains(&status) => {
            SettlementExecutorError::Rejected(message)
        },
        e => SettlementExecutorError::Unavailable(e.to_string()),
    }
}

/// Sends signed settlement requests with `POST /settlements`. The executor confirms asynchronously through the
/// settlement webhook.
pub struct HttpSettlementExecutor {
    client: ApiClient,
}

impl HttpSettlementExecutor {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SettlementExecutor for HttpSettlementExecutor {
    async fn dispatch(&self, request: SignedPayload) -> Result<SettlementReceipt, SettlementExecutorError> {
        let result =
            self.client.post_signed::<DispatchResult>("settlements", &request).await.map_err(executor_error)?;
        Ok(SettlementReceipt { settlement_reference: result.settlement_reference })
    }
}
