//! Payment endpoints: initiation, gateway webhook, client callback.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::AppError;
use crate::services::{DepositRequest, TransferRequest};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct DepositBody {
    pub account_number: String,
    pub email: String,
    pub amount: BigDecimal,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_channel")]
    pub channel: String,
}

#[derive(Debug, Deserialize)]
pub struct TransferBody {
    pub from_account: String,
    pub to_account: String,
    pub email: String,
    pub amount: BigDecimal,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_channel")]
    pub channel: String,
}

fn default_currency() -> String {
    "NGN".to_string()
}

fn default_channel() -> String {
    "card".to_string()
}

#[derive(Debug, Serialize)]
pub struct InitiationResponse {
    pub reference: String,
    pub redirect_url: String,
    pub status: String,
}

pub async fn initiate_deposit(
    State(state): State<AppState>,
    Json(body): Json<DepositBody>,
) -> Result<impl IntoResponse, AppError> {
    let initiated = state
        .initiation
        .initiate_deposit(DepositRequest {
            account_number: body.account_number,
            payer_email: body.email,
            amount: body.amount,
            currency: body.currency,
            channel: body.channel,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(InitiationResponse {
            reference: initiated.reference,
            redirect_url: initiated.redirect_url,
            status: initiated.transaction.status.as_str().to_string(),
        }),
    ))
}

pub async fn initiate_transfer(
    State(state): State<AppState>,
    Json(body): Json<TransferBody>,
) -> Result<impl IntoResponse, AppError> {
    let initiated = state
        .initiation
        .initiate_transfer(TransferRequest {
            from_account: body.from_account,
            to_account: body.to_account,
            payer_email: body.email,
            amount: body.amount,
            currency: body.currency,
            channel: body.channel,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(InitiationResponse {
            reference: initiated.reference,
            redirect_url: initiated.redirect_url,
            status: initiated.transaction.status.as_str().to_string(),
        }),
    ))
}

/// Gateway webhook. Always acknowledged with 200: non-2xx makes the
/// gateway retry, and while the idempotent state machine would absorb
/// the duplicates safely, there is no reason to invite them.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let signature = headers
        .get(state.config.webhook_signature_header.as_str())
        .and_then(|v| v.to_str().ok());

    match state.verification.process_webhook(&body, signature).await {
        Ok(Some(outcome)) => (StatusCode::OK, Json(json!({ "status": "ok", "outcome": outcome }))),
        Ok(None) => (StatusCode::OK, Json(json!({ "status": "ok" }))),
        Err(e) => {
            tracing::error!("webhook processing failed: {e}");
            (StatusCode::OK, Json(json!({ "status": "ok" })))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub reference: String,
}

/// Client callback after the gateway redirect. Carries the true outcome,
/// including any reconciliation warning.
pub async fn callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state.verification.process_callback(&params.reference).await?;
    Ok(Json(outcome))
}

pub async fn get_transaction(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let tx = state
        .store
        .transaction_by_reference(&reference)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::NotFound(format!("transaction {reference}")))?;

    Ok(Json(tx))
}
