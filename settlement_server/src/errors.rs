use actix_web::{
    error::ResponseError,
    http::{
        header::{ContentType, RETRY_AFTER},
        StatusCode,
    },
    HttpResponse,
};
use log::error;
use serde_json::json;
use settlement_engine::OrderFlowError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("No signature was provided in the {0} header")]
    MissingSignature(&'static str),
    #[error("{0}")]
    OrderFlow(#[from] OrderFlowError),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
}

impl ServerError {
    /// The machine-readable error code sent to clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::OrderFlow(e) => e.code(),
            Self::InvalidRequestBody(_) => "VALIDATION_ERROR",
            Self::MissingSignature(_) => "INVALID_SIGNATURE",
            _ => "INTERNAL_ERROR",
        }
    }
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::MissingSignature(_) => StatusCode::UNAUTHORIZED,
            Self::OrderFlow(e) => match e {
                OrderFlowError::InvalidRequest(_) | OrderFlowError::InvalidAmount { .. } => StatusCode::BAD_REQUEST,
                OrderFlowError::TokenNotSupported { .. } |
                OrderFlowError::BelowMinimum { .. } |
                OrderFlowError::OrderNotCancellable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                OrderFlowError::DuplicateRequest { .. } => StatusCode::CONFLICT,
                OrderFlowError::InsufficientLiquidity { .. } | OrderFlowError::NoRouteLiquidity { .. } => {
                    StatusCode::SERVICE_UNAVAILABLE
                },
                OrderFlowError::OrderNotFound(_) => StatusCode::NOT_FOUND,
                OrderFlowError::InvalidSignature => StatusCode::UNAUTHORIZED,
                OrderFlowError::PaymentGatewayUnavailable(_) => StatusCode::BAD_GATEWAY,
                OrderFlowError::SettlementFailure(_) |
                OrderFlowError::UpstreamUnavailable(_) |
                OrderFlowError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let mut response = HttpResponse::build(status);
        response.insert_header(ContentType::json());
        // Internal details stay in the logs
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("💻️ {self}");
            "An internal error occurred.".to_string()
        } else {
            self.to_string()
        };
        let body = match self {
            Self::OrderFlow(e) => {
                if let Some(wait) = e.retry_after() {
                    response.insert_header((RETRY_AFTER, wait.as_secs().to_string()));
                }
                json!({ "error": message, "code": e.code(), "retryable": e.retryable(), "context": e.context() })
            },
            _ => json!({ "error": message, "code": self.code() }),
        };
        response.body(body.to_string())
    }
}
