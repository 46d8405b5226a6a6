use async_trait::async_trait;
use log::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use settlement_engine::traits::{CheckoutRequest, CheckoutSession, PaymentGateway, PaymentGatewayError};

use super::{ApiClient, ApiClientError};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckoutParams {
    amount: Decimal,
    reference: String,
    payer_info: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckoutResult {
    checkout_url: String,
    payment_reference: String,
}

fn gateway_error(e: ApiClientError) -> PaymentGatewayError {
    match e {
        ApiClientError::Timeout => PaymentGatewayError::Timeout,
        ApiClientError::QueryError { status, message } if (400..500).contains(&status) => {
            PaymentGatewayError::Rejected(message)
        },
        e => PaymentGatewayError::Unavailable(e.to_string()),
    }
}

/// Issues hosted checkout links with `POST /checkouts`.
pub struct HttpPaymentGateway {
    client: ApiClient,
}

impl HttpPaymentGateway {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_checkout(&self, request: CheckoutRequest) -> Result<CheckoutSession, PaymentGatewayError> {
        let params =
            CheckoutParams { amount: request.amount, reference: request.reference, payer_info: request.payer_info };
        let result = self.client.post::<CheckoutResult, _>("checkouts", params).await.map_err(gateway_error)?;
        debug!("💻️ Checkout issued with payment reference {}", result.payment_reference);
        Ok(CheckoutSession { checkout_url: result.checkout_url, payment_reference: result.payment_reference })
    }
}
