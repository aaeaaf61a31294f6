use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::gateway::GatewayError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("invalid webhook signature")]
    InvalidSignature,

    #[error("insufficient funds in wallet {0}")]
    InsufficientFunds(Uuid),

    #[error("transfer source and destination wallets are the same")]
    SameWalletTransfer,

    #[error("gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("gateway error: {0}")]
    Gateway(String),

    #[error("reconciliation required: {0}")]
    ReconciliationRequired(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("internal server error: {0}")]
    Internal(String),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_)
            | AppError::InsufficientFunds(_)
            | AppError::SameWalletTransfer => StatusCode::BAD_REQUEST,
            AppError::InvalidSignature => StatusCode::UNAUTHORIZED,
            AppError::GatewayUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Gateway(_) => StatusCode::BAD_GATEWAY,
            AppError::ReconciliationRequired(_)
            | AppError::Database(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => AppError::NotFound(what),
            StoreError::DuplicateReference(r) => {
                AppError::Validation(format!("duplicate reference {r}"))
            }
            StoreError::InsufficientFunds(wallet_id) => AppError::InsufficientFunds(wallet_id),
            StoreError::Conflict(msg) => AppError::Validation(msg),
            StoreError::Database(msg) => AppError::Database(msg),
        }
    }
}

impl From<GatewayError> for AppError {
    fn from(e: GatewayError) -> Self {
        // A timeout or open circuit must never mark anything FAILED: the
        // payment may have succeeded at the gateway. Callers get a
        // retryable error instead.
        if e.is_retryable() {
            AppError::GatewayUnavailable(e.to_string())
        } else {
            AppError::Gateway(e.to_string())
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
