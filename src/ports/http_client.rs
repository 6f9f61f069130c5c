//! Outbound HTTP port used by provider adapters for enrichment calls.

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::billing::BillingError;

/// Authenticated JSON GET.
///
/// Non-2xx responses and transport failures are `BillingError::Upstream`.
/// Implementations do not retry; the provider redelivers the webhook.
#[async_trait]
pub trait ProviderHttpClient: Send + Sync {
    async fn get_json(&self, url: &str, bearer_token: &str) -> Result<Value, BillingError>;
}
