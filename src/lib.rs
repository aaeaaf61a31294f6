pub mod config;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod notify;
pub mod services;
pub mod signature;
pub mod store;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::config::Config;
use crate::gateway::PaymentGateway;
use crate::notify::NotificationPort;
use crate::services::{InitiationService, VerificationService};
use crate::signature::SignatureVerifier;
use crate::store::LedgerStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn LedgerStore>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub notifier: Arc<dyn NotificationPort>,
    pub verification: Arc<VerificationService>,
    pub initiation: Arc<InitiationService>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn NotificationPort>,
        config: Config,
    ) -> Self {
        let verifier = SignatureVerifier::new(config.webhook_secret.as_bytes().to_vec());
        let verification = Arc::new(VerificationService::new(
            Arc::clone(&store),
            Arc::clone(&gateway),
            Arc::clone(&notifier),
            verifier,
        ));
        let initiation = Arc::new(InitiationService::new(
            Arc::clone(&store),
            Arc::clone(&gateway),
        ));

        Self {
            store,
            gateway,
            notifier,
            verification,
            initiation,
            config: Arc::new(config),
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/payments/deposit", post(handlers::payments::initiate_deposit))
        .route("/payments/transfer", post(handlers::payments::initiate_transfer))
        .route("/payments/webhook", post(handlers::payments::webhook))
        .route("/payments/callback", get(handlers::payments::callback))
        .route("/transactions/:reference", get(handlers::payments::get_transaction))
        .with_state(state)
}
