//! Post-settlement notification port.
//!
//! The engine tells payer and payee that their balances changed through
//! an injected port, never through ambient request state. Emission
//! failures are the caller's to downgrade: committed Transaction/Wallet
//! state is never affected by a notification problem.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::domain::Transaction;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("notification channel closed")]
    ChannelClosed,

    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventKind {
    #[serde(rename = "DEBIT_TRANSACTION")]
    DebitTransaction,
    #[serde(rename = "DEPOSIT_TRANSACTION")]
    DepositTransaction,
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationEvent {
    pub event: EventKind,
    pub user_id: Uuid,
    pub transaction: Transaction,
}

#[async_trait]
pub trait NotificationPort: Send + Sync {
    async fn emit(&self, event: NotificationEvent) -> Result<(), NotifyError>;
}

/// Broadcast-backed notifier. Downstream consumers (websocket fan-out,
/// push delivery) subscribe to the channel; sending never blocks.
pub struct BroadcastNotifier {
    sender: broadcast::Sender<NotificationEvent>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NotificationEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl NotificationPort for BroadcastNotifier {
    async fn emit(&self, event: NotificationEvent) -> Result<(), NotifyError> {
        // An error here only means no subscriber is currently listening,
        // which is fine for fire-and-forget delivery.
        if let Err(e) = self.sender.send(event) {
            tracing::debug!("no notification subscribers: {e}");
        }
        Ok(())
    }
}
