pub mod account;
pub mod transaction;
pub mod wallet;

pub use account::{Account, AccountStatus};
pub use transaction::{
    mirror_reference, Transaction, TransactionDetail, TransactionKind, TransactionStatus,
    MIRROR_SUFFIX,
};
pub use wallet::Wallet;
