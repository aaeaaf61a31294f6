//! State machine behavior across the webhook and callback channels.

mod common;

use bigdecimal::BigDecimal;
use common::*;
use payrail_core::domain::{
    Transaction, TransactionDetail, TransactionKind, TransactionStatus,
};
use payrail_core::error::AppError;
use payrail_core::notify::EventKind;
use payrail_core::services::TransferRequest;
use payrail_core::store::LedgerStore;
use uuid::Uuid;

#[tokio::test]
async fn test_webhook_success_settles_transfer() {
    let env = test_env(10_000, 2_000).await;
    initiate_transfer(&env, "TX123", 5_000).await;

    let body = webhook_body("TX123", "success");
    let signature = sign(&body);

    let outcome = env
        .state
        .verification
        .process_webhook(&body, Some(&signature))
        .await
        .unwrap()
        .expect("webhook should be processed");

    assert_eq!(outcome.status, TransactionStatus::Completed);
    assert!(outcome.settled);
    assert!(!outcome.duplicate);
    assert!(outcome.warning.is_none());

    assert_eq!(balance_of(&env, env.wallet_a).await, BigDecimal::from(5_000));
    assert_eq!(balance_of(&env, env.wallet_b).await, BigDecimal::from(7_000));

    let primary = env
        .store
        .transaction_by_reference("TX123")
        .await
        .unwrap()
        .unwrap();
    let mirror = env
        .store
        .transaction_by_reference("TX123-MIRROR")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(primary.status, TransactionStatus::Completed);
    assert_eq!(mirror.status, TransactionStatus::Completed);
    assert_eq!(primary.gateway_status.as_deref(), Some("success"));
}

#[tokio::test]
async fn test_duplicate_webhook_is_noop() {
    let env = test_env(10_000, 2_000).await;
    initiate_transfer(&env, "TX123", 5_000).await;

    let body = webhook_body("TX123", "success");
    let signature = sign(&body);

    let first = env
        .state
        .verification
        .process_webhook(&body, Some(&signature))
        .await
        .unwrap()
        .unwrap();
    assert!(!first.duplicate);

    let second = env
        .state
        .verification
        .process_webhook(&body, Some(&signature))
        .await
        .unwrap()
        .unwrap();
    assert!(second.duplicate);
    assert_eq!(second.status, TransactionStatus::Completed);

    // balances unchanged from the single-transfer outcome
    assert_eq!(balance_of(&env, env.wallet_a).await, BigDecimal::from(5_000));
    assert_eq!(balance_of(&env, env.wallet_b).await, BigDecimal::from(7_000));
}

#[tokio::test]
async fn test_gateway_failure_fails_both_records() {
    let env = test_env(10_000, 2_000).await;
    initiate_transfer(&env, "TX-FAIL", 5_000).await;

    let body = webhook_body("TX-FAIL", "failed");
    let signature = sign(&body);

    let outcome = env
        .state
        .verification
        .process_webhook(&body, Some(&signature))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(outcome.status, TransactionStatus::Failed);
    assert!(!outcome.settled);

    let mirror = env
        .store
        .transaction_by_reference("TX-FAIL-MIRROR")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(mirror.status, TransactionStatus::Failed);

    // no money moved
    assert_eq!(balance_of(&env, env.wallet_a).await, BigDecimal::from(10_000));
    assert_eq!(balance_of(&env, env.wallet_b).await, BigDecimal::from(2_000));
}

#[tokio::test]
async fn test_unknown_gateway_status_leaves_state_untouched() {
    let env = test_env(10_000, 2_000).await;
    initiate_transfer(&env, "TX-PEND", 5_000).await;

    let body = webhook_body("TX-PEND", "ongoing");
    let signature = sign(&body);

    let outcome = env
        .state
        .verification
        .process_webhook(&body, Some(&signature))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(outcome.status, TransactionStatus::InProgress);
    assert!(!outcome.settled);

    let tx = env
        .store
        .transaction_by_reference("TX-PEND")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(tx.status, TransactionStatus::InProgress);
    assert_eq!(tx.gateway_status.as_deref(), Some("ongoing"));
    assert_eq!(balance_of(&env, env.wallet_a).await, BigDecimal::from(10_000));
}

#[tokio::test]
async fn test_webhook_unknown_reference_discarded() {
    let env = test_env(10_000, 2_000).await;

    let body = webhook_body("TX-GHOST", "success");
    let signature = sign(&body);

    let result = env
        .state
        .verification
        .process_webhook(&body, Some(&signature))
        .await
        .unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn test_insufficient_funds_settlement_flags_reconciliation() {
    // Gateway confirms the charge, but the payer's wallet cannot cover
    // the internal transfer: payment stays COMPLETED, the transfer is
    // flagged for reconciliation, and no balance is touched.
    let env = test_env(2_000, 2_000).await;
    initiate_transfer(&env, "TX-SHORT", 5_000).await;

    let body = webhook_body("TX-SHORT", "success");
    let signature = sign(&body);

    let outcome = env
        .state
        .verification
        .process_webhook(&body, Some(&signature))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(outcome.status, TransactionStatus::Completed);
    assert!(!outcome.settled);
    let warning = outcome.warning.expect("reconciliation warning");
    assert!(warning.contains("reconciliation"), "warning: {warning}");

    let tx = env
        .store
        .transaction_by_reference("TX-SHORT")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(tx.status, TransactionStatus::Completed);

    assert_eq!(balance_of(&env, env.wallet_a).await, BigDecimal::from(2_000));
    assert_eq!(balance_of(&env, env.wallet_b).await, BigDecimal::from(2_000));
}

#[tokio::test]
async fn test_notification_failure_keeps_completed_with_warning() {
    let env = failing_notifier_env(10_000, 2_000).await;
    initiate_transfer(&env, "TX-NOTIFY", 5_000).await;

    let body = webhook_body("TX-NOTIFY", "success");
    let signature = sign(&body);

    let outcome = env
        .state
        .verification
        .process_webhook(&body, Some(&signature))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(outcome.status, TransactionStatus::Completed);
    let warning = outcome.warning.expect("notification warning");
    assert!(warning.contains("notification"), "warning: {warning}");

    // the funds did move; only the notification was lost, and the
    // outcome must say so or reconciliation tooling would settle again
    assert!(outcome.settled, "funds moved but outcome reports unsettled");
    assert_eq!(balance_of(&env, env.wallet_a).await, BigDecimal::from(5_000));
    assert_eq!(balance_of(&env, env.wallet_b).await, BigDecimal::from(7_000));
}

#[tokio::test]
async fn test_settlement_emits_events_to_both_parties() {
    let env = test_env(10_000, 2_000).await;
    initiate_transfer(&env, "TX-EV", 5_000).await;
    let mut rx = env.notifier.subscribe();

    let body = webhook_body("TX-EV", "success");
    let signature = sign(&body);
    env.state
        .verification
        .process_webhook(&body, Some(&signature))
        .await
        .unwrap()
        .unwrap();

    let debit = rx.recv().await.unwrap();
    assert_eq!(debit.event, EventKind::DebitTransaction);
    assert_eq!(debit.user_id, env.account_a.owner_user_id);
    assert_eq!(debit.transaction.reference, "TX-EV");

    let deposit = rx.recv().await.unwrap();
    assert_eq!(deposit.event, EventKind::DepositTransaction);
    assert_eq!(deposit.user_id, env.account_b.owner_user_id);
    assert_eq!(deposit.transaction.reference, "TX-EV-MIRROR");
}

#[tokio::test]
async fn test_callback_uses_gateway_answer_not_client_claim() {
    let env = test_env(10_000, 2_000).await;
    initiate_transfer(&env, "TX-CB", 5_000).await;

    // The gateway says failed; whatever the redirecting client believes
    // is irrelevant.
    env.gateway.set_verify_status("failed");

    let outcome = env
        .state
        .verification
        .process_callback("TX-CB")
        .await
        .unwrap();

    assert_eq!(outcome.status, TransactionStatus::Failed);
    assert_eq!(balance_of(&env, env.wallet_a).await, BigDecimal::from(10_000));
}

#[tokio::test]
async fn test_callback_success_settles_once() {
    let env = test_env(10_000, 2_000).await;
    initiate_transfer(&env, "TX-CB2", 5_000).await;

    let first = env
        .state
        .verification
        .process_callback("TX-CB2")
        .await
        .unwrap();
    assert_eq!(first.status, TransactionStatus::Completed);
    assert!(first.settled);

    let second = env
        .state
        .verification
        .process_callback("TX-CB2")
        .await
        .unwrap();
    assert!(second.duplicate);

    assert_eq!(balance_of(&env, env.wallet_a).await, BigDecimal::from(5_000));
    assert_eq!(balance_of(&env, env.wallet_b).await, BigDecimal::from(7_000));
}

#[tokio::test]
async fn test_redelivery_finalizes_lagging_mirror() {
    // Primary finalized but the mirror left IN_PROGRESS, as a crash
    // between the two writes would. The next delivery must repair the
    // mirror instead of returning a duplicate and leaving it behind.
    let env = test_env(10_000, 2_000).await;
    initiate_transfer(&env, "TX-LAG", 5_000).await;

    env.store
        .finalize_status("TX-LAG", TransactionStatus::Completed, "success")
        .await
        .unwrap();

    let body = webhook_body("TX-LAG", "success");
    let signature = sign(&body);
    let outcome = env
        .state
        .verification
        .process_webhook(&body, Some(&signature))
        .await
        .unwrap()
        .unwrap();
    assert!(outcome.duplicate);

    let mirror = env
        .store
        .transaction_by_reference("TX-LAG-MIRROR")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(mirror.status, TransactionStatus::Completed);
}

#[tokio::test]
async fn test_failed_transfer_initiation_leaves_no_mirror() {
    let env = test_env(10_000, 2_000).await;

    // the gateway hands back a reference that already has a ledger row,
    // so persisting the primary fails
    let taken = Transaction::new(
        "TX-TAKEN".to_string(),
        Uuid::new_v4(),
        Uuid::new_v4(),
        BigDecimal::from(100),
        "NGN".to_string(),
        TransactionKind::Deposit,
        TransactionDetail::default(),
    );
    env.store.insert_transaction(&taken).await.unwrap();
    env.gateway.set_next_reference("TX-TAKEN");

    let err = env
        .state
        .initiation
        .initiate_transfer(TransferRequest {
            from_account: ACCOUNT_A.to_string(),
            to_account: ACCOUNT_B.to_string(),
            payer_email: "payer@example.com".to_string(),
            amount: BigDecimal::from(1_000),
            currency: "NGN".to_string(),
            channel: "card".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let mirror = env
        .store
        .transaction_by_reference("TX-TAKEN-MIRROR")
        .await
        .unwrap();
    assert!(mirror.is_none(), "orphan mirror row left behind");
}

#[tokio::test]
async fn test_callback_unknown_reference_is_not_found() {
    let env = test_env(10_000, 2_000).await;

    let err = env
        .state
        .verification
        .process_callback("TX-MISSING")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_gateway_timeout_is_retryable_and_leaves_state() {
    let env = test_env(10_000, 2_000).await;
    initiate_transfer(&env, "TX-DOWN", 5_000).await;

    env.gateway.set_verify_unavailable(true);

    let err = env
        .state
        .verification
        .process_callback("TX-DOWN")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::GatewayUnavailable(_)));

    // never FAILED off the back of a transport problem
    let tx = env
        .store
        .transaction_by_reference("TX-DOWN")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(tx.status, TransactionStatus::InProgress);

    // recoverable once the gateway is back
    env.gateway.set_verify_unavailable(false);
    let outcome = env
        .state
        .verification
        .process_callback("TX-DOWN")
        .await
        .unwrap();
    assert_eq!(outcome.status, TransactionStatus::Completed);
}
