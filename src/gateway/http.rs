//! HTTP payment gateway adapter.
//!
//! Bearer-authenticated reqwest client with a bounded timeout and a
//! consecutive-failures circuit breaker. Amounts are converted to the
//! provider's minor-unit representation before transmission.

use std::time::Duration;

use async_trait::async_trait;
use bigdecimal::{BigDecimal, ToPrimitive};
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config as CircuitConfig, Error as FailsafeError, StateMachine};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::{GatewayError, GatewayVerification, InitiatedPayment, PaymentGateway};

type Circuit = StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>;

#[derive(Clone)]
pub struct HttpPaymentGateway {
    client: Client,
    base_url: String,
    secret_key: String,
    circuit_breaker: Circuit,
}

#[derive(Debug, Deserialize)]
struct InitializeResponse {
    status: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<InitializeData>,
}

#[derive(Debug, Deserialize)]
struct InitializeData {
    authorization_url: String,
    reference: String,
}

/// Convert a major-unit amount to the provider's integral minor units.
fn to_minor_units(amount: &BigDecimal) -> Result<i64, GatewayError> {
    (amount * BigDecimal::from(100))
        .to_i64()
        .ok_or_else(|| GatewayError::InvalidResponse(format!("amount {amount} out of range")))
}

impl HttpPaymentGateway {
    pub fn new(base_url: String, secret_key: String, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(Duration::from_secs(60), Duration::from_secs(120));
        let policy = failure_policy::consecutive_failures(3, backoff);
        let circuit_breaker = CircuitConfig::new().failure_policy(policy).build();

        HttpPaymentGateway {
            client,
            base_url,
            secret_key,
            circuit_breaker,
        }
    }

    /// Returns the current state of the circuit breaker
    pub fn circuit_state(&self) -> String {
        if self.circuit_breaker.is_call_permitted() {
            "closed".to_string()
        } else {
            "open".to_string()
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    fn name(&self) -> &str {
        "paystack"
    }

    async fn initiate_payment(
        &self,
        payer_email: &str,
        amount: &BigDecimal,
        channel: &str,
        currency: &str,
    ) -> Result<InitiatedPayment, GatewayError> {
        let url = self.endpoint("transaction/initialize");
        let body = json!({
            "email": payer_email,
            "amount": to_minor_units(amount)?,
            "channels": [channel],
            "currency": currency,
        });

        let client = self.client.clone();
        let secret = self.secret_key.clone();

        let result = self
            .circuit_breaker
            .call(async move {
                let response = client
                    .post(&url)
                    .bearer_auth(&secret)
                    .json(&body)
                    .send()
                    .await?;

                let status = response.status();
                let parsed = response.json::<InitializeResponse>().await?;

                if !status.is_success() || !parsed.status {
                    return Err(GatewayError::Declined(
                        parsed
                            .message
                            .unwrap_or_else(|| format!("initialize returned {status}")),
                    ));
                }

                let data = parsed.data.ok_or_else(|| {
                    GatewayError::InvalidResponse("initialize response missing data".to_string())
                })?;

                Ok(InitiatedPayment {
                    reference: data.reference,
                    redirect_url: data.authorization_url,
                })
            })
            .await;

        match result {
            Ok(initiated) => Ok(initiated),
            Err(FailsafeError::Rejected) => Err(GatewayError::CircuitOpen),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }

    async fn verify(&self, reference: &str) -> Result<GatewayVerification, GatewayError> {
        let url = self.endpoint(&format!("transaction/verify/{reference}"));
        let client = self.client.clone();
        let secret = self.secret_key.clone();

        let result = self
            .circuit_breaker
            .call(async move {
                let response = client.get(&url).bearer_auth(&secret).send().await?;

                let status = response.status();
                if !status.is_success() {
                    return Err(GatewayError::Declined(format!("verify returned {status}")));
                }

                let raw = response.json::<serde_json::Value>().await?;
                let gateway_status = raw
                    .get("data")
                    .and_then(|d| d.get("status"))
                    .and_then(|s| s.as_str())
                    .ok_or_else(|| {
                        GatewayError::InvalidResponse(
                            "verify response missing data.status".to_string(),
                        )
                    })?
                    .to_string();

                Ok(GatewayVerification {
                    gateway_status,
                    raw,
                })
            })
            .await;

        match result {
            Ok(verification) => Ok(verification),
            Err(FailsafeError::Rejected) => Err(GatewayError::CircuitOpen),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }
}
