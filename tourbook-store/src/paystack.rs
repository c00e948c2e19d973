//! Paystack integration: inline popup parameters and transaction verification
//! over the REST API.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};
use tourbook_core::payment::{
    PaymentLauncher, PaymentRequest, PopupLaunch, TransactionOutcome, TransactionVerifier,
    VerifiedTransaction,
};
use tourbook_core::{CoreError, CoreResult};

/// Builds the parameters the browser passes to `PaystackPop.setup`. No
/// network call is made; the popup itself talks to Paystack.
#[derive(Clone, Default)]
pub struct InlinePopupLauncher;

#[async_trait]
impl PaymentLauncher for InlinePopupLauncher {
    async fn launch(&self, public_key: &str, request: &PaymentRequest) -> CoreResult<PopupLaunch> {
        if request.amount_minor <= 0 {
            return Err(CoreError::ProviderError(format!(
                "amount must be positive, got {}",
                request.amount_minor
            )));
        }
        if request.email.trim().is_empty() {
            return Err(CoreError::ProviderError("email is required".to_string()));
        }

        debug!("Popup prepared for reference {}", request.reference);
        Ok(PopupLaunch {
            key: public_key.to_string(),
            email: request.email.clone(),
            amount: request.amount_minor,
            currency: request.currency.clone(),
            reference: request.reference.clone(),
            metadata: request.metadata.clone(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct VerifyEnvelope {
    status: bool,
    #[serde(default)]
    message: String,
    data: Option<VerifyData>,
}

#[derive(Debug, Deserialize)]
struct VerifyData {
    status: String,
    reference: String,
    amount: i64,
    currency: String,
}

fn outcome_of(status: &str) -> TransactionOutcome {
    match status {
        "success" => TransactionOutcome::Success,
        "abandoned" => TransactionOutcome::Abandoned,
        "failed" => TransactionOutcome::Failed,
        "reversed" => TransactionOutcome::Reversed,
        _ => TransactionOutcome::Unknown,
    }
}

/// Server-side verification client. Needs the secret key.
#[derive(Clone)]
pub struct PaystackClient {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
}

impl PaystackClient {
    pub fn new(base_url: &str, secret_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
        }
    }
}

#[async_trait]
impl TransactionVerifier for PaystackClient {
    async fn verify(&self, reference: &str) -> CoreResult<VerifiedTransaction> {
        let url = format!("{}/transaction/verify/{}", self.base_url, reference);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| CoreError::ProviderError(format!("paystack: {}", e)))?;

        let envelope: VerifyEnvelope = resp
            .json()
            .await
            .map_err(|e| CoreError::ProviderError(format!("paystack response: {}", e)))?;

        let data = match (envelope.status, envelope.data) {
            (true, Some(data)) => data,
            _ => {
                warn!("Paystack rejected verification of {}: {}", reference, envelope.message);
                return Err(CoreError::ProviderError(envelope.message));
            }
        };

        Ok(VerifiedTransaction {
            reference: data.reference,
            outcome: outcome_of(&data.status),
            amount_minor: data.amount,
            currency: data.currency,
        })
    }
}
