//! Ledger store port.
//!
//! All durable state (accounts, wallets, transactions) is read and
//! mutated through this trait. Two operations carry the correctness
//! load of the whole engine:
//!
//! - `finalize_status` is a compare-and-swap: it transitions a
//!   transaction into a terminal state only if it is not already
//!   terminal, which is what makes duplicate gateway deliveries safe.
//! - `debit_wallet` / `credit_wallet` are atomic increments at the
//!   store level, never read-modify-write in application code, and the
//!   store itself refuses to let a balance go negative.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{Account, Transaction, TransactionStatus, Wallet};

pub mod memory;
pub mod postgres;

pub use memory::MemoryLedgerStore;
pub use postgres::PgLedgerStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("duplicate reference: {0}")]
    DuplicateReference(String),

    #[error("insufficient funds in wallet {0}")]
    InsufficientFunds(Uuid),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Result of a conditional terminal-status update.
#[derive(Debug)]
pub enum StatusUpdate {
    /// This call won the persistence race; the returned row reflects the
    /// new terminal status.
    Applied(Transaction),
    /// The transaction was already terminal; the stored row is returned
    /// untouched.
    AlreadyTerminal(Transaction),
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn put_account(&self, account: &Account) -> StoreResult<()>;

    async fn put_wallet(&self, wallet: &Wallet) -> StoreResult<()>;

    async fn account(&self, id: Uuid) -> StoreResult<Account>;

    async fn account_by_number(&self, account_number: &str) -> StoreResult<Account>;

    async fn wallet(&self, id: Uuid) -> StoreResult<Wallet>;

    async fn insert_transaction(&self, tx: &Transaction) -> StoreResult<Transaction>;

    async fn transaction_by_reference(&self, reference: &str)
        -> StoreResult<Option<Transaction>>;

    /// Move a Pending transaction to InProgress (gateway accepted the
    /// initiation). No-op error if the transaction is past Pending.
    async fn mark_in_progress(&self, reference: &str) -> StoreResult<()>;

    /// Record the raw provider status without touching `status`.
    async fn record_gateway_status(&self, reference: &str, gateway_status: &str)
        -> StoreResult<()>;

    /// Compare-and-swap into a terminal status. Applies only while the
    /// current status is non-terminal; a concurrent terminal write makes
    /// this return `AlreadyTerminal` with the stored row.
    async fn finalize_status(
        &self,
        reference: &str,
        status: TransactionStatus,
        gateway_status: &str,
    ) -> StoreResult<StatusUpdate>;

    /// Atomic decrement. Fails with `InsufficientFunds` before any write
    /// if the wallet holds less than `amount`.
    async fn debit_wallet(&self, wallet_id: Uuid, amount: &BigDecimal) -> StoreResult<()>;

    /// Atomic increment.
    async fn credit_wallet(&self, wallet_id: Uuid, amount: &BigDecimal) -> StoreResult<()>;
}
