//! Transaction domain entity.
//! One ledger entry per payment attempt, keyed by the gateway reference.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Suffix appended to a transfer's reference to derive its mirror record.
pub const MIRROR_SUFFIX: &str = "-MIRROR";

/// Derive the receiving-side reference for a transfer.
pub fn mirror_reference(reference: &str) -> String {
    format!("{reference}{MIRROR_SUFFIX}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TransactionStatus {
    /// Completed and Failed are idempotent absorbers: once reached, no
    /// further transition is permitted.
    pub fn is_terminal(self) -> bool {
        matches!(self, TransactionStatus::Completed | TransactionStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::InProgress => "IN_PROGRESS",
            TransactionStatus::Completed => "COMPLETED",
            TransactionStatus::Failed => "FAILED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "PENDING" => Some(TransactionStatus::Pending),
            "IN_PROGRESS" => Some(TransactionStatus::InProgress),
            "COMPLETED" => Some(TransactionStatus::Completed),
            "FAILED" => Some(TransactionStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    Deposit,
    Transfer,
    Withdraw,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionKind::Deposit => "DEPOSIT",
            TransactionKind::Transfer => "TRANSFER",
            TransactionKind::Withdraw => "WITHDRAW",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "DEPOSIT" => Some(TransactionKind::Deposit),
            "TRANSFER" => Some(TransactionKind::Transfer),
            "WITHDRAW" => Some(TransactionKind::Withdraw),
            _ => None,
        }
    }
}

/// Gateway name and counterparty account numbers, carried for settlement
/// resolution and operator-facing detail.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionDetail {
    pub gateway: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_account: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub reference: String,
    pub user_id: Uuid,
    pub account_id: Uuid,
    pub amount: BigDecimal,
    pub currency: String,
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    pub gateway_status: Option<String>,
    pub detail: TransactionDetail,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        reference: String,
        user_id: Uuid,
        account_id: Uuid,
        amount: BigDecimal,
        currency: String,
        kind: TransactionKind,
        detail: TransactionDetail,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            reference,
            user_id,
            account_id,
            amount,
            currency,
            kind,
            status: TransactionStatus::Pending,
            gateway_status: None,
            detail,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn mirror_reference(&self) -> String {
        mirror_reference(&self.reference)
    }

    pub fn is_mirror(&self) -> bool {
        self.reference.ends_with(MIRROR_SUFFIX)
    }
}
