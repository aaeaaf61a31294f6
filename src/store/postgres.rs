//! Postgres implementation of the ledger store.
//!
//! The compare-and-swap and the non-negative balance guard are expressed
//! as conditional UPDATEs, so they hold under concurrent connections
//! without any application-side locking. The schema additionally carries
//! a `CHECK (balance >= 0)` constraint (see `migrations/`).

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use uuid::Uuid;

use crate::config::Config;
use crate::domain::{
    Account, AccountStatus, Transaction, TransactionDetail, TransactionKind, TransactionStatus,
    Wallet,
};

use super::{LedgerStore, StatusUpdate, StoreError, StoreResult};

pub async fn create_pool(config: &Config) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
}

#[derive(Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct AccountRow {
    id: Uuid,
    account_number: String,
    owner_user_id: Uuid,
    status: String,
    wallet_id: Uuid,
}

impl AccountRow {
    fn into_domain(self) -> StoreResult<Account> {
        let status = AccountStatus::parse(&self.status)
            .ok_or_else(|| StoreError::Database(format!("bad account status {}", self.status)))?;
        Ok(Account {
            id: self.id,
            account_number: self.account_number,
            owner_user_id: self.owner_user_id,
            status,
            wallet_id: self.wallet_id,
        })
    }
}

#[derive(Debug, FromRow)]
struct WalletRow {
    id: Uuid,
    account_id: Uuid,
    balance: BigDecimal,
    currency: String,
    is_active: bool,
}

impl WalletRow {
    fn into_domain(self) -> Wallet {
        Wallet {
            id: self.id,
            account_id: self.account_id,
            balance: self.balance,
            currency: self.currency,
            is_active: self.is_active,
        }
    }
}

#[derive(Debug, FromRow)]
struct TransactionRow {
    id: Uuid,
    reference: String,
    user_id: Uuid,
    account_id: Uuid,
    amount: BigDecimal,
    currency: String,
    kind: String,
    status: String,
    gateway_status: Option<String>,
    detail: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TransactionRow {
    fn into_domain(self) -> StoreResult<Transaction> {
        let status = TransactionStatus::parse(&self.status)
            .ok_or_else(|| StoreError::Database(format!("bad status {}", self.status)))?;
        let kind = TransactionKind::parse(&self.kind)
            .ok_or_else(|| StoreError::Database(format!("bad kind {}", self.kind)))?;
        let detail: TransactionDetail = serde_json::from_value(self.detail)
            .map_err(|e| StoreError::Database(format!("bad detail json: {e}")))?;
        Ok(Transaction {
            id: self.id,
            reference: self.reference,
            user_id: self.user_id,
            account_id: self.account_id,
            amount: self.amount,
            currency: self.currency,
            kind,
            status,
            gateway_status: self.gateway_status,
            detail,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn map_sqlx(e: sqlx::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn put_account(&self, account: &Account) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts (id, account_number, owner_user_id, status, wallet_id)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE
            SET account_number = EXCLUDED.account_number,
                owner_user_id = EXCLUDED.owner_user_id,
                status = EXCLUDED.status,
                wallet_id = EXCLUDED.wallet_id
            "#,
        )
        .bind(account.id)
        .bind(&account.account_number)
        .bind(account.owner_user_id)
        .bind(account.status.as_str())
        .bind(account.wallet_id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn put_wallet(&self, wallet: &Wallet) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO wallets (id, account_id, balance, currency, is_active)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE
            SET balance = EXCLUDED.balance,
                currency = EXCLUDED.currency,
                is_active = EXCLUDED.is_active
            "#,
        )
        .bind(wallet.id)
        .bind(wallet.account_id)
        .bind(&wallet.balance)
        .bind(&wallet.currency)
        .bind(wallet.is_active)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn account(&self, id: Uuid) -> StoreResult<Account> {
        let row = sqlx::query_as::<_, AccountRow>("SELECT * FROM accounts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        row.ok_or_else(|| StoreError::NotFound(format!("account {id}")))?
            .into_domain()
    }

    async fn account_by_number(&self, account_number: &str) -> StoreResult<Account> {
        let row =
            sqlx::query_as::<_, AccountRow>("SELECT * FROM accounts WHERE account_number = $1")
                .bind(account_number)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx)?;
        row.ok_or_else(|| StoreError::NotFound(format!("account {account_number}")))?
            .into_domain()
    }

    async fn wallet(&self, id: Uuid) -> StoreResult<Wallet> {
        let row = sqlx::query_as::<_, WalletRow>("SELECT * FROM wallets WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(row
            .ok_or_else(|| StoreError::NotFound(format!("wallet {id}")))?
            .into_domain())
    }

    async fn insert_transaction(&self, tx: &Transaction) -> StoreResult<Transaction> {
        let detail = serde_json::to_value(&tx.detail)
            .map_err(|e| StoreError::Database(format!("detail json: {e}")))?;
        let row = sqlx::query_as::<_, TransactionRow>(
            r#"
            INSERT INTO transactions (
                id, reference, user_id, account_id, amount, currency,
                kind, status, gateway_status, detail, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(tx.id)
        .bind(&tx.reference)
        .bind(tx.user_id)
        .bind(tx.account_id)
        .bind(&tx.amount)
        .bind(&tx.currency)
        .bind(tx.kind.as_str())
        .bind(tx.status.as_str())
        .bind(&tx.gateway_status)
        .bind(detail)
        .bind(tx.created_at)
        .bind(tx.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db) = &e {
                if db.is_unique_violation() {
                    return StoreError::DuplicateReference(tx.reference.clone());
                }
            }
            map_sqlx(e)
        })?;
        row.into_domain()
    }

    async fn transaction_by_reference(
        &self,
        reference: &str,
    ) -> StoreResult<Option<Transaction>> {
        let row =
            sqlx::query_as::<_, TransactionRow>("SELECT * FROM transactions WHERE reference = $1")
                .bind(reference)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx)?;
        row.map(TransactionRow::into_domain).transpose()
    }

    async fn mark_in_progress(&self, reference: &str) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE transactions
            SET status = 'IN_PROGRESS', updated_at = NOW()
            WHERE reference = $1 AND status = 'PENDING'
            "#,
        )
        .bind(reference)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!(
                "transaction {reference} not in PENDING"
            )));
        }
        Ok(())
    }

    async fn record_gateway_status(
        &self,
        reference: &str,
        gateway_status: &str,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE transactions SET gateway_status = $2, updated_at = NOW() WHERE reference = $1",
        )
        .bind(reference)
        .bind(gateway_status)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("transaction {reference}")));
        }
        Ok(())
    }

    async fn finalize_status(
        &self,
        reference: &str,
        status: TransactionStatus,
        gateway_status: &str,
    ) -> StoreResult<StatusUpdate> {
        // Conditional update: only a non-terminal row takes the write.
        let row = sqlx::query_as::<_, TransactionRow>(
            r#"
            UPDATE transactions
            SET status = $2, gateway_status = $3, updated_at = NOW()
            WHERE reference = $1 AND status NOT IN ('COMPLETED', 'FAILED')
            RETURNING *
            "#,
        )
        .bind(reference)
        .bind(status.as_str())
        .bind(gateway_status)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        if let Some(row) = row {
            return Ok(StatusUpdate::Applied(row.into_domain()?));
        }

        // Either unknown reference, or another delivery already won.
        match self.transaction_by_reference(reference).await? {
            Some(tx) => Ok(StatusUpdate::AlreadyTerminal(tx)),
            None => Err(StoreError::NotFound(format!("transaction {reference}"))),
        }
    }

    async fn debit_wallet(&self, wallet_id: Uuid, amount: &BigDecimal) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE wallets SET balance = balance - $2 WHERE id = $1 AND balance >= $2",
        )
        .bind(wallet_id)
        .bind(amount)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        if result.rows_affected() == 0 {
            // Distinguish a missing wallet from a guarded debit.
            self.wallet(wallet_id).await?;
            return Err(StoreError::InsufficientFunds(wallet_id));
        }
        Ok(())
    }

    async fn credit_wallet(&self, wallet_id: Uuid, amount: &BigDecimal) -> StoreResult<()> {
        let result = sqlx::query("UPDATE wallets SET balance = balance + $2 WHERE id = $1")
            .bind(wallet_id)
            .bind(amount)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("wallet {wallet_id}")));
        }
        Ok(())
    }
}
