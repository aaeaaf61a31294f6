//! Wallet domain entity.
//! The balance-bearing side of an account; balances never go negative.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub id: Uuid,
    pub account_id: Uuid,
    pub balance: BigDecimal,
    pub currency: String,
    pub is_active: bool,
}

impl Wallet {
    pub fn new(account_id: Uuid, currency: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            balance: BigDecimal::from(0),
            currency,
            is_active: true,
        }
    }

    pub fn with_balance(account_id: Uuid, currency: String, balance: BigDecimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            balance,
            currency,
            is_active: true,
        }
    }
}
