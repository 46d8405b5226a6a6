use std::time::Duration;

use rust_decimal::Decimal;
use serde_json::{json, Value};
use thiserror::Error;

use crate::{
    db_types::{Network, OrderId, OrderStatusType},
    route_finder::RouteError,
    traits::OrderStoreError,
};

/// Every error the order coordinator returns to its callers. Each variant carries a machine-readable
/// [`code`](OrderFlowError::code) and numeric [`context`](OrderFlowError::context).
#[derive(Debug, Clone, Error)]
pub enum OrderFlowError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("The amount {amount} is outside the accepted range of {min} to {max}")]
    InvalidAmount { amount: Decimal, min: Decimal, max: Decimal },
    #[error("{token} is not supported on {network}")]
    TokenNotSupported { token: String, network: Network },
    #[error("The settlement value of {settlement_value} is below the minimum of {minimum_settlement}")]
    BelowMinimum { settlement_value: Decimal, minimum_settlement: Decimal, minimum_fiat: Decimal },
    #[error("No single liquidity provider can fund {required} on {network}")]
    InsufficientLiquidity { network: Network, required: Decimal, max_available: Option<Decimal>, retry_after: Duration },
    #[error("There is no route liquidity for {token} on {network}")]
    NoRouteLiquidity { token: String, network: Network, retry_after: Duration },
    #[error("A live order already exists for this request: {existing_order}")]
    DuplicateRequest { existing_order: OrderId, retry_after: Duration },
    #[error("Order {0} does not exist")]
    OrderNotFound(String),
    #[error("Order {order_id} cannot be cancelled in the {status} state")]
    OrderNotCancellable { order_id: OrderId, status: OrderStatusType },
    #[error("The payload signature is invalid")]
    InvalidSignature,
    #[error("Settlement failed: {0}")]
    SettlementFailure(String),
    #[error("The payment gateway is unavailable: {0}")]
    PaymentGatewayUnavailable(String),
    #[error("An upstream service is unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl OrderFlowError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) | Self::InvalidAmount { .. } | Self::OrderNotCancellable { .. } => {
                "VALIDATION_ERROR"
            },
            Self::TokenNotSupported { .. } => "TOKEN_NOT_SUPPORTED",
            Self::BelowMinimum { .. } => "BELOW_MINIMUM",
            Self::InsufficientLiquidity { .. } => "INSUFFICIENT_LIQUIDITY",
            Self::NoRouteLiquidity { .. } => "NO_ROUTE_LIQUIDITY",
            Self::DuplicateRequest { .. } => "DUPLICATE_REQUEST",
            Self::OrderNotFound(_) => "ORDER_NOT_FOUND",
            Self::InvalidSignature => "INVALID_SIGNATURE",
            Self::SettlementFailure(_) => "SETTLEMENT_FAILURE",
            Self::PaymentGatewayUnavailable(_) => "PAYMENT_GATEWAY_UNAVAILABLE",
            Self::UpstreamUnavailable(_) | Self::DatabaseError(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the same request may succeed if it is retried later, unchanged.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            Self::InsufficientLiquidity { .. } |
                Self::NoRouteLiquidity { .. } |
                Self::DuplicateRequest { .. } |
                Self::PaymentGatewayUnavailable(_) |
                Self::UpstreamUnavailable(_)
        )
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::InsufficientLiquidity { retry_after, .. } |
            Self::NoRouteLiquidity { retry_after, .. } |
            Self::DuplicateRequest { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }

    /// Structured details of the failure, for API responses.
    pub fn context(&self) -> Value {
        match self {
            Self::InvalidAmount { amount, min, max } => json!({ "amount": amount, "min": min, "max": max }),
            Self::TokenNotSupported { token, network } => json!({ "token": token, "network": network }),
            Self::BelowMinimum { settlement_value, minimum_settlement, minimum_fiat } => json!({
                "settlement_value": settlement_value,
                "minimum_settlement": minimum_settlement,
                "minimum_fiat_amount": minimum_fiat,
            }),
            Self::InsufficientLiquidity { network, required, max_available, retry_after } => json!({
                "network": network,
                "required": required,
                "max_available": max_available,
                "retry_after_secs": retry_after.as_secs(),
            }),
            Self::NoRouteLiquidity { token, network, retry_after } => json!({
                "token": token,
                "network": network,
                "retry_after_secs": retry_after.as_secs(),
            }),
            Self::DuplicateRequest { existing_order, retry_after } => json!({
                "existing_order_id": existing_order.as_str(),
                "retry_after_secs": retry_after.as_secs(),
            }),
            Self::OrderNotFound(id) => json!({ "order_id": id }),
            Self::OrderNotCancellable { order_id, status } => {
                json!({ "order_id": order_id.as_str(), "status": status })
            },
            _ => json!({}),
        }
    }

    pub(crate) fn from_route_error(e: RouteError, retry_after: Duration) -> Self {
        match e {
            RouteError::TokenNotSupported { token, network } => Self::TokenNotSupported { token, network },
            RouteError::NotConfigured(network) => Self::TokenNotSupported { token: "*".to_string(), network },
            RouteError::NoLiquidity { token, network } => Self::NoRouteLiquidity { token, network, retry_after },
            RouteError::Upstream(e) => Self::UpstreamUnavailable(e),
        }
    }
}

impl From<OrderStoreError> for OrderFlowError {
    fn from(e: OrderStoreError) -> Self {
        match e {
            OrderStoreError::OrderNotFound(id) => OrderFlowError::OrderNotFound(id.as_str().to_string()),
            e => OrderFlowError::DatabaseError(e.to_string()),
        }
    }
}
