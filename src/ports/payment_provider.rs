//! Payment provider port for inbound webhooks.
//!
//! One implementation per vendor. Adapters authenticate a raw webhook,
//! translate it into a [`NormalizedEvent`] and optionally fetch live
//! subscription state from the vendor API.
//!
//! # Cancellation
//!
//! Every method is an `async fn`; dropping the returned future aborts any
//! in-flight I/O. The HTTP layer bounds each webhook with a timeout and the
//! outbound HTTP client carries its own per-request timeout.

use async_trait::async_trait;
use http::HeaderMap;
use serde::{Deserialize, Serialize};

use crate::domain::billing::{BillingError, NormalizedEvent, SubscriptionStatus};
use crate::domain::foundation::Timestamp;

/// Raw inbound webhook: headers plus the exact body bytes.
#[derive(Debug, Clone, Default)]
pub struct WebhookRequest {
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl WebhookRequest {
    pub fn new(headers: HeaderMap, body: impl Into<Vec<u8>>) -> Self {
        Self {
            headers,
            body: body.into(),
        }
    }

    /// Returns a header value as a string, `None` when absent or not UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

/// Live subscription state as reported by a provider API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionInfo {
    pub subscription_id: String,
    pub customer_id: Option<String>,
    pub customer_email: Option<String>,
    pub status: SubscriptionStatus,
    pub plan_name: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub next_billing_date: Option<Timestamp>,
    pub cancel_url: Option<String>,
    pub update_url: Option<String>,
}

/// Port implemented by each payment provider adapter.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Registry key, e.g. `stripe`.
    fn name(&self) -> &str;

    /// Authenticates the webhook.
    ///
    /// Fails with `MissingSignature`, `InvalidSignature`,
    /// `WebhookTimestampTooOld` or `InvalidPayload`. Has no side effects.
    async fn verify(&self, request: &WebhookRequest) -> Result<(), BillingError>;

    /// Translates the webhook into a normalized event.
    ///
    /// Works without a prior `verify` call. Fails with `PayloadParsing`,
    /// `MissingRequiredField`, `InvalidEventType`, or an enrichment error.
    async fn parse(&self, request: &WebhookRequest) -> Result<NormalizedEvent, BillingError>;

    /// Fetches a subscription from the provider API.
    async fn lookup_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<SubscriptionInfo, BillingError>;
}
