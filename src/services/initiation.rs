//! Payment initiation.
//!
//! Creates ledger entries when a payment is set up with the gateway.
//! Transactions are born PENDING and move to IN_PROGRESS once the
//! gateway accepts the initiation; everything after that is driven by
//! the verification state machine.

use std::sync::Arc;

use bigdecimal::BigDecimal;

use crate::domain::{
    mirror_reference, Account, Transaction, TransactionDetail, TransactionKind,
};
use crate::error::AppError;
use crate::gateway::{InitiatedPayment, PaymentGateway};
use crate::store::LedgerStore;

#[derive(Debug)]
pub struct DepositRequest {
    pub account_number: String,
    pub payer_email: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub channel: String,
}

#[derive(Debug)]
pub struct TransferRequest {
    pub from_account: String,
    pub to_account: String,
    pub payer_email: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub channel: String,
}

/// What the caller needs to continue the flow: the gateway reference to
/// poll and the redirect URL to send the payer to.
#[derive(Debug)]
pub struct InitiatedTransaction {
    pub reference: String,
    pub redirect_url: String,
    pub transaction: Transaction,
}

pub struct InitiationService {
    store: Arc<dyn LedgerStore>,
    gateway: Arc<dyn PaymentGateway>,
}

impl InitiationService {
    pub fn new(store: Arc<dyn LedgerStore>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { store, gateway }
    }

    pub async fn initiate_deposit(
        &self,
        request: DepositRequest,
    ) -> Result<InitiatedTransaction, AppError> {
        validate_amount(&request.amount)?;
        let account = self.active_account(&request.account_number).await?;

        let initiated = self
            .gateway
            .initiate_payment(
                &request.payer_email,
                &request.amount,
                &request.channel,
                &request.currency,
            )
            .await?;

        let detail = TransactionDetail {
            gateway: self.gateway.name().to_string(),
            sender_account: None,
            recipient_account: Some(account.account_number.clone()),
        };
        let tx = Transaction::new(
            initiated.reference.clone(),
            account.owner_user_id,
            account.id,
            request.amount,
            request.currency,
            TransactionKind::Deposit,
            detail,
        );

        self.persist_in_progress(tx, initiated).await
    }

    pub async fn initiate_transfer(
        &self,
        request: TransferRequest,
    ) -> Result<InitiatedTransaction, AppError> {
        validate_amount(&request.amount)?;
        if request.from_account == request.to_account {
            return Err(AppError::Validation(
                "transfer source and destination accounts are the same".to_string(),
            ));
        }

        let payer = self.active_account(&request.from_account).await?;
        let payee = self.active_account(&request.to_account).await?;

        let initiated = self
            .gateway
            .initiate_payment(
                &request.payer_email,
                &request.amount,
                &request.channel,
                &request.currency,
            )
            .await?;

        let detail = TransactionDetail {
            gateway: self.gateway.name().to_string(),
            sender_account: Some(payer.account_number.clone()),
            recipient_account: Some(payee.account_number.clone()),
        };

        let primary = Transaction::new(
            initiated.reference.clone(),
            payer.owner_user_id,
            payer.id,
            request.amount.clone(),
            request.currency.clone(),
            TransactionKind::Transfer,
            detail.clone(),
        );

        // Receiving-side record, locked in step with the primary from
        // here on. Inserted after the primary: a failed initiation must
        // not leave a mirror row with no primary.
        let mirror = Transaction::new(
            mirror_reference(&initiated.reference),
            payee.owner_user_id,
            payee.id,
            request.amount,
            request.currency,
            TransactionKind::Transfer,
            detail,
        );

        let initiated = self.persist_in_progress(primary, initiated).await?;

        self.store.insert_transaction(&mirror).await?;
        self.store.mark_in_progress(&mirror.reference).await?;

        Ok(initiated)
    }

    async fn active_account(&self, account_number: &str) -> Result<Account, AppError> {
        let account = self.store.account_by_number(account_number).await?;
        if !account.is_active() {
            return Err(AppError::Validation(format!(
                "account {account_number} is {}",
                account.status.as_str()
            )));
        }
        Ok(account)
    }

    async fn persist_in_progress(
        &self,
        tx: Transaction,
        initiated: InitiatedPayment,
    ) -> Result<InitiatedTransaction, AppError> {
        self.store.insert_transaction(&tx).await?;
        self.store.mark_in_progress(&tx.reference).await?;

        let transaction = self
            .store
            .transaction_by_reference(&tx.reference)
            .await?
            .unwrap_or(tx);

        tracing::info!(
            reference = %transaction.reference,
            kind = transaction.kind.as_str(),
            "payment initiated"
        );

        Ok(InitiatedTransaction {
            reference: transaction.reference.clone(),
            redirect_url: initiated.redirect_url,
            transaction,
        })
    }
}

fn validate_amount(amount: &BigDecimal) -> Result<(), AppError> {
    if *amount <= BigDecimal::from(0) {
        return Err(AppError::Validation("amount must be positive".to_string()));
    }
    Ok(())
}
