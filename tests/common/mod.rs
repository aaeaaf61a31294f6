//! Shared test harness: in-memory ledger, programmable gateway, seeded
//! accounts.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use serde_json::json;
use uuid::Uuid;

use payrail_core::config::Config;
use payrail_core::domain::{Account, AccountStatus, Wallet};
use payrail_core::gateway::{
    GatewayError, GatewayVerification, InitiatedPayment, PaymentGateway,
};
use payrail_core::notify::{BroadcastNotifier, NotificationEvent, NotificationPort, NotifyError};
use payrail_core::services::TransferRequest;
use payrail_core::signature::SignatureVerifier;
use payrail_core::store::{LedgerStore, MemoryLedgerStore};
use payrail_core::AppState;

pub const ACCOUNT_A: &str = "0000000001";
pub const ACCOUNT_B: &str = "0000000002";
pub const WEBHOOK_SECRET: &str = "test_webhook_secret";

pub fn test_config() -> Config {
    Config {
        server_port: 0,
        database_url: "postgres://unused".to_string(),
        gateway_base_url: "https://gateway.test".to_string(),
        gateway_secret_key: "sk_test".to_string(),
        webhook_secret: WEBHOOK_SECRET.to_string(),
        webhook_signature_header: "x-gateway-signature".to_string(),
        gateway_timeout_secs: 5,
    }
}

/// Programmable gateway double: the next initiation reference and the
/// verify answer are both test-controlled.
pub struct MockGateway {
    next_reference: Mutex<String>,
    verify_status: Mutex<String>,
    verify_unavailable: Mutex<bool>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            next_reference: Mutex::new("TX-DEFAULT".to_string()),
            verify_status: Mutex::new("success".to_string()),
            verify_unavailable: Mutex::new(false),
        }
    }

    pub fn set_next_reference(&self, reference: &str) {
        *self.next_reference.lock().unwrap() = reference.to_string();
    }

    pub fn set_verify_status(&self, status: &str) {
        *self.verify_status.lock().unwrap() = status.to_string();
    }

    pub fn set_verify_unavailable(&self, unavailable: bool) {
        *self.verify_unavailable.lock().unwrap() = unavailable;
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    fn name(&self) -> &str {
        "mockpay"
    }

    async fn initiate_payment(
        &self,
        _payer_email: &str,
        _amount: &BigDecimal,
        _channel: &str,
        _currency: &str,
    ) -> Result<InitiatedPayment, GatewayError> {
        Ok(InitiatedPayment {
            reference: self.next_reference.lock().unwrap().clone(),
            redirect_url: "https://gateway.test/redirect".to_string(),
        })
    }

    async fn verify(&self, reference: &str) -> Result<GatewayVerification, GatewayError> {
        if *self.verify_unavailable.lock().unwrap() {
            return Err(GatewayError::CircuitOpen);
        }
        let status = self.verify_status.lock().unwrap().clone();
        Ok(GatewayVerification {
            gateway_status: status.clone(),
            raw: json!({ "data": { "reference": reference, "status": status } }),
        })
    }
}

/// Notifier that always fails, for exercising the post-settlement
/// warning path.
pub struct FailingNotifier;

#[async_trait]
impl NotificationPort for FailingNotifier {
    async fn emit(&self, _event: NotificationEvent) -> Result<(), NotifyError> {
        Err(NotifyError::Delivery("socket registry offline".to_string()))
    }
}

pub struct TestEnv {
    pub state: AppState,
    pub store: Arc<MemoryLedgerStore>,
    pub gateway: Arc<MockGateway>,
    pub notifier: Arc<BroadcastNotifier>,
    pub account_a: Account,
    pub account_b: Account,
    pub wallet_a: Uuid,
    pub wallet_b: Uuid,
}

pub async fn test_env(balance_a: i64, balance_b: i64) -> TestEnv {
    let notifier = Arc::new(BroadcastNotifier::default());
    test_env_with_notifier(
        balance_a,
        balance_b,
        Arc::clone(&notifier) as Arc<dyn NotificationPort>,
        notifier,
    )
    .await
}

pub async fn failing_notifier_env(balance_a: i64, balance_b: i64) -> TestEnv {
    // The broadcast handle is kept for struct shape; the state uses the
    // failing port.
    let unused = Arc::new(BroadcastNotifier::default());
    test_env_with_notifier(balance_a, balance_b, Arc::new(FailingNotifier), unused).await
}

async fn test_env_with_notifier(
    balance_a: i64,
    balance_b: i64,
    port: Arc<dyn NotificationPort>,
    notifier: Arc<BroadcastNotifier>,
) -> TestEnv {
    let store = Arc::new(MemoryLedgerStore::new());
    let gateway = Arc::new(MockGateway::new());

    let account_a = seed_account(store.as_ref(), ACCOUNT_A, balance_a).await;
    let account_b = seed_account(store.as_ref(), ACCOUNT_B, balance_b).await;
    let wallet_a = account_a.wallet_id;
    let wallet_b = account_b.wallet_id;

    let state = AppState::new(
        Arc::clone(&store) as Arc<dyn LedgerStore>,
        Arc::clone(&gateway) as Arc<dyn PaymentGateway>,
        port,
        test_config(),
    );

    TestEnv {
        state,
        store,
        gateway,
        notifier,
        account_a,
        account_b,
        wallet_a,
        wallet_b,
    }
}

pub async fn seed_account(store: &MemoryLedgerStore, number: &str, balance: i64) -> Account {
    let account_id = Uuid::new_v4();
    let wallet = Wallet::with_balance(account_id, "NGN".to_string(), BigDecimal::from(balance));
    let account = Account {
        id: account_id,
        account_number: number.to_string(),
        owner_user_id: Uuid::new_v4(),
        status: AccountStatus::Active,
        wallet_id: wallet.id,
    };
    store.put_wallet(&wallet).await.unwrap();
    store.put_account(&account).await.unwrap();
    account
}

/// Initiate an A -> B transfer through the engine, pinning the gateway
/// reference so tests can address it.
pub async fn initiate_transfer(env: &TestEnv, reference: &str, amount: i64) {
    env.gateway.set_next_reference(reference);
    env.state
        .initiation
        .initiate_transfer(TransferRequest {
            from_account: ACCOUNT_A.to_string(),
            to_account: ACCOUNT_B.to_string(),
            payer_email: "payer@example.com".to_string(),
            amount: BigDecimal::from(amount),
            currency: "NGN".to_string(),
            channel: "card".to_string(),
        })
        .await
        .expect("transfer initiation");
}

pub fn webhook_body(reference: &str, status: &str) -> Vec<u8> {
    json!({ "reference": reference, "status": status })
        .to_string()
        .into_bytes()
}

pub fn sign(body: &[u8]) -> String {
    SignatureVerifier::new(WEBHOOK_SECRET.as_bytes().to_vec()).sign(body)
}

pub async fn balance_of(env: &TestEnv, wallet_id: Uuid) -> BigDecimal {
    env.store.wallet(wallet_id).await.unwrap().balance
}
