//! reqwest implementation of the provider HTTP port.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::domain::billing::BillingError;
use crate::ports::ProviderHttpClient;

/// JSON GET client with bearer authentication and a per-request timeout.
#[derive(Clone)]
pub struct ReqwestProviderClient {
    http_client: reqwest::Client,
}

impl ReqwestProviderClient {
    /// Builds a client whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, BillingError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BillingError::InvalidConfig(format!("HTTP client: {}", e)))?;
        Ok(Self { http_client })
    }
}

#[async_trait]
impl ProviderHttpClient for ReqwestProviderClient {
    async fn get_json(&self, url: &str, bearer_token: &str) -> Result<Value, BillingError> {
        let response = self
            .http_client
            .get(url)
            .bearer_auth(bearer_token)
            .header(reqwest::header::ACCEPT, "application/json, application/vnd.api+json")
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(url = %url, error = %e, "Provider API request failed");
                BillingError::Upstream(format!("request to {} failed: {}", url, e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(url = %url, status = %status, "Provider API returned error");
            return Err(BillingError::Upstream(format!(
                "{} returned {}: {}",
                url, status, body
            )));
        }

        response.json::<Value>().await.map_err(|e| {
            BillingError::Upstream(format!("invalid JSON from {}: {}", url, e))
        })
    }
}
