//! In-memory ledger store.
//!
//! Backs the test suite and local demos. Every mutation runs under the
//! single write lock, so the conditional status update and the
//! balance-guarded debit are atomic with respect to concurrent callers,
//! matching the semantics the Postgres adapter gets from conditional
//! UPDATEs.

use std::collections::HashMap;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{Account, Transaction, TransactionStatus, Wallet};

use super::{LedgerStore, StatusUpdate, StoreError, StoreResult};

#[derive(Default)]
struct Inner {
    accounts: HashMap<Uuid, Account>,
    account_numbers: HashMap<String, Uuid>,
    wallets: HashMap<Uuid, Wallet>,
    // keyed by gateway reference, which is globally unique
    transactions: HashMap<String, Transaction>,
}

#[derive(Default)]
pub struct MemoryLedgerStore {
    inner: RwLock<Inner>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn put_account(&self, account: &Account) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner
            .account_numbers
            .insert(account.account_number.clone(), account.id);
        inner.accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn put_wallet(&self, wallet: &Wallet) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.wallets.insert(wallet.id, wallet.clone());
        Ok(())
    }

    async fn account(&self, id: Uuid) -> StoreResult<Account> {
        let inner = self.inner.read().await;
        inner
            .accounts
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("account {id}")))
    }

    async fn account_by_number(&self, account_number: &str) -> StoreResult<Account> {
        let inner = self.inner.read().await;
        inner
            .account_numbers
            .get(account_number)
            .and_then(|id| inner.accounts.get(id))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("account {account_number}")))
    }

    async fn wallet(&self, id: Uuid) -> StoreResult<Wallet> {
        let inner = self.inner.read().await;
        inner
            .wallets
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("wallet {id}")))
    }

    async fn insert_transaction(&self, tx: &Transaction) -> StoreResult<Transaction> {
        let mut inner = self.inner.write().await;
        if inner.transactions.contains_key(&tx.reference) {
            return Err(StoreError::DuplicateReference(tx.reference.clone()));
        }
        inner.transactions.insert(tx.reference.clone(), tx.clone());
        Ok(tx.clone())
    }

    async fn transaction_by_reference(
        &self,
        reference: &str,
    ) -> StoreResult<Option<Transaction>> {
        let inner = self.inner.read().await;
        Ok(inner.transactions.get(reference).cloned())
    }

    async fn mark_in_progress(&self, reference: &str) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let tx = inner
            .transactions
            .get_mut(reference)
            .ok_or_else(|| StoreError::NotFound(format!("transaction {reference}")))?;
        if tx.status != TransactionStatus::Pending {
            return Err(StoreError::Conflict(format!(
                "transaction {reference} is {}, expected PENDING",
                tx.status.as_str()
            )));
        }
        tx.status = TransactionStatus::InProgress;
        tx.updated_at = Utc::now();
        Ok(())
    }

    async fn record_gateway_status(
        &self,
        reference: &str,
        gateway_status: &str,
    ) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let tx = inner
            .transactions
            .get_mut(reference)
            .ok_or_else(|| StoreError::NotFound(format!("transaction {reference}")))?;
        tx.gateway_status = Some(gateway_status.to_string());
        tx.updated_at = Utc::now();
        Ok(())
    }

    async fn finalize_status(
        &self,
        reference: &str,
        status: TransactionStatus,
        gateway_status: &str,
    ) -> StoreResult<StatusUpdate> {
        let mut inner = self.inner.write().await;
        let tx = inner
            .transactions
            .get_mut(reference)
            .ok_or_else(|| StoreError::NotFound(format!("transaction {reference}")))?;

        if tx.status.is_terminal() {
            return Ok(StatusUpdate::AlreadyTerminal(tx.clone()));
        }

        tx.status = status;
        tx.gateway_status = Some(gateway_status.to_string());
        tx.updated_at = Utc::now();
        Ok(StatusUpdate::Applied(tx.clone()))
    }

    async fn debit_wallet(&self, wallet_id: Uuid, amount: &BigDecimal) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let wallet = inner
            .wallets
            .get_mut(&wallet_id)
            .ok_or_else(|| StoreError::NotFound(format!("wallet {wallet_id}")))?;
        if wallet.balance < *amount {
            return Err(StoreError::InsufficientFunds(wallet_id));
        }
        wallet.balance = &wallet.balance - amount;
        Ok(())
    }

    async fn credit_wallet(&self, wallet_id: Uuid, amount: &BigDecimal) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let wallet = inner
            .wallets
            .get_mut(&wallet_id)
            .ok_or_else(|| StoreError::NotFound(format!("wallet {wallet_id}")))?;
        wallet.balance = &wallet.balance + amount;
        Ok(())
    }
}
