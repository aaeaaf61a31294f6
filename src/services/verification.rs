//! Transaction state machine.
//!
//! One component drives both gateway confirmation channels, so webhook
//! and callback semantics can never diverge. The channels differ only in
//! trust source: a webhook is trusted because its signature verifies, a
//! callback is never trusted at all; the engine re-queries the gateway
//! and believes only that answer.
//!
//! Terminal statuses persist before settlement runs. A crash between the
//! status write and the fund movement leaves the transaction correctly
//! marked and the money unmoved, which an out-of-band reconciliation job
//! can repair. The reverse order would risk moving money twice.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::{Transaction, TransactionKind, TransactionStatus};
use crate::error::AppError;
use crate::gateway::{classify_status, PaymentGateway, StatusClass};
use crate::notify::{EventKind, NotificationEvent, NotificationPort, NotifyError};
use crate::signature::SignatureVerifier;
use crate::store::{LedgerStore, StatusUpdate};

use super::settlement::SettlementService;

/// Which channel vouched for the gateway status being applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustSource {
    SignedWebhook,
    GatewayQuery,
}

/// Result of a verification request, returned to callers and serialized
/// into callback responses. `settled` reports whether funds moved;
/// `warning` carries post-completion problems that need an operator.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationOutcome {
    pub reference: String,
    pub status: TransactionStatus,
    pub duplicate: bool,
    pub settled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    pub transaction: Transaction,
}

impl VerificationOutcome {
    fn duplicate(tx: Transaction) -> Self {
        Self {
            reference: tx.reference.clone(),
            status: tx.status,
            duplicate: true,
            settled: tx.status == TransactionStatus::Completed,
            warning: None,
            transaction: tx,
        }
    }

    fn pending(tx: Transaction) -> Self {
        Self {
            reference: tx.reference.clone(),
            status: tx.status,
            duplicate: false,
            settled: false,
            warning: None,
            transaction: tx,
        }
    }

    fn failed(tx: Transaction) -> Self {
        Self {
            reference: tx.reference.clone(),
            status: tx.status,
            duplicate: false,
            settled: false,
            warning: None,
            transaction: tx,
        }
    }

    fn completed(tx: Transaction, settled: bool, warning: Option<String>) -> Self {
        Self {
            reference: tx.reference.clone(),
            status: tx.status,
            duplicate: false,
            settled,
            warning,
            transaction: tx,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WebhookEnvelope {
    #[serde(default)]
    reference: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    data: Option<WebhookData>,
}

#[derive(Debug, Deserialize)]
struct WebhookData {
    reference: String,
    status: String,
}

impl WebhookEnvelope {
    /// Providers deliver either a flat body or an enveloped `data`
    /// object; accept both.
    fn into_fields(self) -> Option<(String, String)> {
        if let Some(data) = self.data {
            return Some((data.reference, data.status));
        }
        match (self.reference, self.status) {
            (Some(reference), Some(status)) => Some((reference, status)),
            _ => None,
        }
    }
}

pub struct VerificationService {
    store: Arc<dyn LedgerStore>,
    gateway: Arc<dyn PaymentGateway>,
    settlement: SettlementService,
    notifier: Arc<dyn NotificationPort>,
    verifier: SignatureVerifier,
}

impl VerificationService {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn NotificationPort>,
        verifier: SignatureVerifier,
    ) -> Self {
        let settlement = SettlementService::new(Arc::clone(&store));
        Self {
            store,
            gateway,
            settlement,
            notifier,
            verifier,
        }
    }

    pub fn settlement(&self) -> &SettlementService {
        &self.settlement
    }

    /// Webhook entry point. Returns `Ok(None)` when the delivery is
    /// discarded (bad signature, unparseable body, unknown reference);
    /// the handler still acknowledges with 200 so the gateway does not
    /// retry-storm us.
    pub async fn process_webhook(
        &self,
        raw_body: &[u8],
        signature_header: Option<&str>,
    ) -> Result<Option<VerificationOutcome>, AppError> {
        if !self.verifier.verify(raw_body, signature_header) {
            tracing::warn!("discarding webhook with missing or invalid signature");
            return Ok(None);
        }

        let envelope: WebhookEnvelope = match serde_json::from_slice(raw_body) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!("discarding unparseable webhook body: {e}");
                return Ok(None);
            }
        };

        let Some((reference, status)) = envelope.into_fields() else {
            tracing::warn!("discarding webhook without reference/status fields");
            return Ok(None);
        };

        if self
            .store
            .transaction_by_reference(&reference)
            .await?
            .is_none()
        {
            tracing::warn!(%reference, "webhook for unknown reference");
            return Ok(None);
        }

        let outcome = self
            .apply_gateway_report(&reference, &status, TrustSource::SignedWebhook)
            .await?;
        Ok(Some(outcome))
    }

    /// Callback entry point. The redirect is unauthenticated, so any
    /// status the client claims is ignored; the gateway is re-queried
    /// and only its answer is applied.
    pub async fn process_callback(
        &self,
        reference: &str,
    ) -> Result<VerificationOutcome, AppError> {
        let primary = self
            .store
            .transaction_by_reference(reference)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("transaction {reference}")))?;

        let mirror = self
            .store
            .transaction_by_reference(&primary.mirror_reference())
            .await?;

        // Idempotent short-circuit before spending a gateway call.
        if primary.status.is_terminal()
            && mirror.as_ref().map_or(true, |m| m.status.is_terminal())
        {
            return Ok(VerificationOutcome::duplicate(primary));
        }

        // A transport timeout surfaces as a retryable error here and the
        // transaction stays in its prior state.
        let verification = self.gateway.verify(reference).await?;

        self.apply_gateway_report(
            reference,
            &verification.gateway_status,
            TrustSource::GatewayQuery,
        )
        .await
    }

    /// Shared transition logic for both channels.
    async fn apply_gateway_report(
        &self,
        reference: &str,
        gateway_status: &str,
        source: TrustSource,
    ) -> Result<VerificationOutcome, AppError> {
        let primary = self
            .store
            .transaction_by_reference(reference)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("transaction {reference}")))?;

        if primary.is_mirror() {
            // Mirrors move in lock-step with their primary, never directly.
            return Err(AppError::Validation(format!(
                "reference {reference} is a mirror record"
            )));
        }

        let mirror_ref = primary.mirror_reference();
        let mirror = self.store.transaction_by_reference(&mirror_ref).await?;

        if primary.status.is_terminal()
            && mirror.as_ref().map_or(true, |m| m.status.is_terminal())
        {
            tracing::info!(
                %reference, ?source,
                "duplicate delivery for terminal transaction, returning stored result"
            );
            return Ok(VerificationOutcome::duplicate(primary));
        }

        match classify_status(gateway_status) {
            StatusClass::Pending => {
                self.store
                    .record_gateway_status(reference, gateway_status)
                    .await?;
                if mirror.is_some() {
                    self.store
                        .record_gateway_status(&mirror_ref, gateway_status)
                        .await?;
                }
                let tx = self
                    .store
                    .transaction_by_reference(reference)
                    .await?
                    .unwrap_or(primary);
                tracing::info!(%reference, %gateway_status, "gateway still pending");
                Ok(VerificationOutcome::pending(tx))
            }
            StatusClass::Failure => {
                let update = self
                    .store
                    .finalize_status(reference, TransactionStatus::Failed, gateway_status)
                    .await?;
                let tx = match update {
                    StatusUpdate::Applied(tx) => tx,
                    StatusUpdate::AlreadyTerminal(tx) => {
                        self.align_mirror(&mirror_ref, mirror.as_ref(), &tx, gateway_status)
                            .await?;
                        return Ok(VerificationOutcome::duplicate(tx));
                    }
                };
                if mirror.is_some() {
                    self.store
                        .finalize_status(&mirror_ref, TransactionStatus::Failed, gateway_status)
                        .await?;
                }
                tracing::info!(%reference, %gateway_status, ?source, "payment failed at gateway");
                Ok(VerificationOutcome::failed(tx))
            }
            StatusClass::Success => {
                // The conditional update is the tie-break under duplicate
                // near-simultaneous delivery: exactly one caller observes
                // Applied and runs settlement.
                let update = self
                    .store
                    .finalize_status(reference, TransactionStatus::Completed, gateway_status)
                    .await?;
                let tx = match update {
                    StatusUpdate::Applied(tx) => tx,
                    StatusUpdate::AlreadyTerminal(tx) => {
                        // A crash after the primary write can leave the
                        // mirror behind; every later delivery repairs it.
                        self.align_mirror(&mirror_ref, mirror.as_ref(), &tx, gateway_status)
                            .await?;
                        return Ok(VerificationOutcome::duplicate(tx));
                    }
                };

                let mirror_tx = if mirror.is_some() {
                    match self
                        .store
                        .finalize_status(
                            &mirror_ref,
                            TransactionStatus::Completed,
                            gateway_status,
                        )
                        .await?
                    {
                        StatusUpdate::Applied(m) | StatusUpdate::AlreadyTerminal(m) => Some(m),
                    }
                } else {
                    None
                };

                tracing::info!(%reference, ?source, "payment confirmed, settling");

                // The COMPLETED status is already durable and the gateway
                // is the source of truth for the charge; a settlement
                // failure is reported, never rolled back. `settled`
                // tracks the fund movement alone: a lost notification
                // must not make downstream tooling re-run settlement.
                let (settled, warning) = match self.settlement.settle(&tx).await {
                    Ok(()) => match self.notify_parties(&tx, mirror_tx.as_ref()).await {
                        Ok(()) => (true, None),
                        Err(e) => {
                            tracing::warn!(%reference, "post-settlement notification failed: {e}");
                            (true, Some(format!("notification failed: {e}")))
                        }
                    },
                    Err(e) => {
                        tracing::error!(%reference, "settlement failed after completion: {e}");
                        (false, Some(format!("settlement requires reconciliation: {e}")))
                    }
                };

                Ok(VerificationOutcome::completed(tx, settled, warning))
            }
        }
    }

    /// Bring a non-terminal mirror in line with its terminal primary.
    async fn align_mirror(
        &self,
        mirror_ref: &str,
        mirror: Option<&Transaction>,
        primary: &Transaction,
        gateway_status: &str,
    ) -> Result<(), AppError> {
        if let Some(mirror) = mirror {
            if !mirror.status.is_terminal() {
                tracing::warn!(
                    reference = %primary.reference,
                    "mirror lagged behind terminal primary, finalizing"
                );
                self.store
                    .finalize_status(mirror_ref, primary.status, gateway_status)
                    .await?;
            }
        }
        Ok(())
    }

    async fn notify_parties(
        &self,
        tx: &Transaction,
        mirror: Option<&Transaction>,
    ) -> Result<(), NotifyError> {
        match tx.kind {
            TransactionKind::Deposit => {
                self.notifier
                    .emit(NotificationEvent {
                        event: EventKind::DepositTransaction,
                        user_id: tx.user_id,
                        transaction: tx.clone(),
                    })
                    .await
            }
            TransactionKind::Withdraw => {
                self.notifier
                    .emit(NotificationEvent {
                        event: EventKind::DebitTransaction,
                        user_id: tx.user_id,
                        transaction: tx.clone(),
                    })
                    .await
            }
            TransactionKind::Transfer => {
                self.notifier
                    .emit(NotificationEvent {
                        event: EventKind::DebitTransaction,
                        user_id: tx.user_id,
                        transaction: tx.clone(),
                    })
                    .await?;
                if let Some(mirror) = mirror {
                    self.notifier
                        .emit(NotificationEvent {
                            event: EventKind::DepositTransaction,
                            user_id: mirror.user_id,
                            transaction: mirror.clone(),
                        })
                        .await?;
                }
                Ok(())
            }
        }
    }
}
