use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::CoreResult;

/// What the checkout asks the payment popup to collect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub email: String,
    /// Amount in the provider's minor unit (kobo for NGN).
    pub amount_minor: i64,
    pub currency: String,
    pub reference: String,
    pub metadata: serde_json::Value,
}

/// Parameters the browser hands to the provider's inline popup SDK.
///
/// Success and cancel hooks are wired on the browser side; they report back
/// to the checkout's `payment/success` and `payment/cancel` endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PopupLaunch {
    pub key: String,
    pub email: String,
    pub amount: i64,
    pub currency: String,
    pub reference: String,
    pub metadata: serde_json::Value,
}

#[async_trait]
pub trait PaymentLauncher: Send + Sync {
    /// Prepare the popup for `request`. This does not know whether the
    /// customer will pay; only that the SDK was handed the request.
    async fn launch(&self, public_key: &str, request: &PaymentRequest) -> CoreResult<PopupLaunch>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionOutcome {
    Success,
    Abandoned,
    Failed,
    Reversed,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifiedTransaction {
    pub reference: String,
    pub outcome: TransactionOutcome,
    pub amount_minor: i64,
    pub currency: String,
}

/// Server-side confirmation of a callback's transaction reference.
#[async_trait]
pub trait TransactionVerifier: Send + Sync {
    async fn verify(&self, reference: &str) -> CoreResult<VerifiedTransaction>;
}
