//! Account domain entity.
//! A named financial identity owning exactly one wallet.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountStatus {
    Active,
    Inactive,
    Closed,
}

impl AccountStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AccountStatus::Active => "ACTIVE",
            AccountStatus::Inactive => "INACTIVE",
            AccountStatus::Closed => "CLOSED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "ACTIVE" => Some(AccountStatus::Active),
            "INACTIVE" => Some(AccountStatus::Inactive),
            "CLOSED" => Some(AccountStatus::Closed),
            _ => None,
        }
    }
}

/// The settlement engine reads accounts to resolve counterparties;
/// it never mutates them. Account lifecycle is owned elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub account_number: String,
    pub owner_user_id: Uuid,
    pub status: AccountStatus,
    pub wallet_id: Uuid,
}

impl Account {
    pub fn new(account_number: String, owner_user_id: Uuid, wallet_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_number,
            owner_user_id,
            status: AccountStatus::Active,
            wallet_id,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }
}
