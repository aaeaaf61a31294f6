//! Outbound payment gateway port.
//!
//! Pure transport adapters: no business logic lives behind this trait.
//! Transport failures come back as typed values so the state machine can
//! distinguish "the gateway said no" from "we could not reach the
//! gateway". Only the former may drive a transaction to FAILED.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod http;

pub use http::HttpPaymentGateway;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("gateway circuit breaker is open")]
    CircuitOpen,

    #[error("invalid response from gateway: {0}")]
    InvalidResponse(String),

    #[error("gateway declined: {0}")]
    Declined(String),
}

impl GatewayError {
    /// Retryable failures leave transactions in their prior state; the
    /// caller may try again later.
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Transport(e) => e.is_timeout() || e.is_connect(),
            GatewayError::CircuitOpen => true,
            GatewayError::InvalidResponse(_) | GatewayError::Declined(_) => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitiatedPayment {
    pub reference: String,
    pub redirect_url: String,
}

/// The gateway's answer to a verify call: the raw provider status token
/// plus the full response body for audit logging.
#[derive(Debug, Clone)]
pub struct GatewayVerification {
    pub gateway_status: String,
    pub raw: serde_json::Value,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Provider name recorded into transaction detail.
    fn name(&self) -> &str;

    async fn initiate_payment(
        &self,
        payer_email: &str,
        amount: &BigDecimal,
        channel: &str,
        currency: &str,
    ) -> Result<InitiatedPayment, GatewayError>;

    async fn verify(&self, reference: &str) -> Result<GatewayVerification, GatewayError>;
}

/// Classification of a raw provider status token, shared by the webhook
/// and callback paths so the two can never diverge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    Failure,
    Pending,
}

pub fn classify_status(raw: &str) -> StatusClass {
    match raw.to_ascii_lowercase().as_str() {
        "success" => StatusClass::Success,
        "failed" | "abandoned" | "reversed" => StatusClass::Failure,
        _ => StatusClass::Pending,
    }
}
