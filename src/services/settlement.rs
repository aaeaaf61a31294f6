//! Settlement executor.
//!
//! Given a payment that is already durably COMPLETED, moves value
//! between wallets. Debit and credit are independent atomic store
//! operations issued concurrently; the store's own non-negative guard is
//! the authority, the precondition check here only fails fast on a
//! possibly-stale read. A half-applied transfer is surfaced as a
//! distinct reconciliation-required error, never swallowed.

use std::sync::Arc;

use bigdecimal::BigDecimal;
use uuid::Uuid;

use crate::domain::{Transaction, TransactionKind, Wallet};
use crate::error::AppError;
use crate::store::LedgerStore;

pub struct SettlementService {
    store: Arc<dyn LedgerStore>,
}

impl SettlementService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Atomically debit `from` and credit `to`.
    ///
    /// Preconditions, each a hard failure before any write: both wallets
    /// exist; from != to; the source balance covers the amount.
    pub async fn transfer(
        &self,
        from_wallet_id: Uuid,
        to_wallet_id: Uuid,
        amount: &BigDecimal,
    ) -> Result<(), AppError> {
        let from_wallet = self.store.wallet(from_wallet_id).await?;
        self.store.wallet(to_wallet_id).await?;

        if from_wallet_id == to_wallet_id {
            return Err(AppError::SameWalletTransfer);
        }

        if from_wallet.balance < *amount {
            return Err(AppError::InsufficientFunds(from_wallet_id));
        }

        // Two single-field atomic updates, no two-phase lock. The store
        // refuses a negative balance even if the check above raced.
        let (debit, credit) = tokio::join!(
            self.store.debit_wallet(from_wallet_id, amount),
            self.store.credit_wallet(to_wallet_id, amount),
        );

        match (debit, credit) {
            (Ok(()), Ok(())) => Ok(()),
            (Ok(()), Err(e)) => {
                tracing::error!(
                    %from_wallet_id, %to_wallet_id,
                    "credit failed after debit was applied: {e}"
                );
                Err(AppError::ReconciliationRequired(format!(
                    "debit applied to wallet {from_wallet_id} but credit to {to_wallet_id} failed: {e}"
                )))
            }
            (Err(e), Ok(())) => {
                tracing::error!(
                    %from_wallet_id, %to_wallet_id,
                    "debit failed after credit was applied: {e}"
                );
                Err(AppError::ReconciliationRequired(format!(
                    "credit applied to wallet {to_wallet_id} but debit from {from_wallet_id} failed: {e}"
                )))
            }
            (Err(e), Err(_)) => Err(e.into()),
        }
    }

    /// Settle a confirmed transaction: resolve the counterparty wallets
    /// from its detail and move the funds.
    pub async fn settle(&self, tx: &Transaction) -> Result<(), AppError> {
        match tx.kind {
            TransactionKind::Deposit => {
                let wallet = self.wallet_for_account_id(tx.account_id).await?;
                self.store.credit_wallet(wallet.id, &tx.amount).await?;
                Ok(())
            }
            TransactionKind::Withdraw => {
                let wallet = self.wallet_for_account_id(tx.account_id).await?;
                self.store.debit_wallet(wallet.id, &tx.amount).await?;
                Ok(())
            }
            TransactionKind::Transfer => {
                let sender = tx.detail.sender_account.as_deref().ok_or_else(|| {
                    AppError::Validation(format!(
                        "transfer {} has no sender account",
                        tx.reference
                    ))
                })?;
                let recipient = tx.detail.recipient_account.as_deref().ok_or_else(|| {
                    AppError::Validation(format!(
                        "transfer {} has no recipient account",
                        tx.reference
                    ))
                })?;

                let from = self.store.account_by_number(sender).await?;
                let to = self.store.account_by_number(recipient).await?;

                self.transfer(from.wallet_id, to.wallet_id, &tx.amount).await
            }
        }
    }

    async fn wallet_for_account_id(&self, account_id: Uuid) -> Result<Wallet, AppError> {
        let account = self.store.account(account_id).await?;
        Ok(self.store.wallet(account.wallet_id).await?)
    }
}
