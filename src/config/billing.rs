//! Billing provider configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Which side of a provider account the keys belong to.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderEnvironment {
    #[default]
    Sandbox,
    Production,
}

/// One provider's webhook and API settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// Registry key (`stripe`, `lemonsqueezy`, `kofi`). Filled in from the
    /// section name when loaded through [`BillingConfig::providers`].
    #[serde(default)]
    pub provider_name: String,

    /// Webhook signing secret (Ko-fi: verification token)
    #[serde(default)]
    pub webhook_secret: Option<SecretString>,

    /// API key for enrichment calls
    #[serde(default)]
    pub api_key: Option<SecretString>,

    /// Overrides the provider's default API base URL
    #[serde(default)]
    pub api_base_url: Option<String>,

    #[serde(default)]
    pub environment: ProviderEnvironment,
}

impl ProviderConfig {
    /// Builds a config entry in code (tests, embedding).
    pub fn new(provider_name: impl Into<String>, webhook_secret: impl Into<String>) -> Self {
        Self {
            provider_name: provider_name.into(),
            webhook_secret: Some(SecretString::new(webhook_secret.into())),
            api_key: None,
            api_base_url: None,
            environment: ProviderEnvironment::Sandbox,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::new(api_key.into()));
        self
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    /// Webhook secret if set and non-empty.
    pub fn webhook_secret(&self) -> Option<&str> {
        self.webhook_secret
            .as_ref()
            .map(|s| s.expose_secret().as_str())
            .filter(|s| !s.is_empty())
    }

    /// API key, empty when not configured.
    pub fn api_key(&self) -> &str {
        self.api_key
            .as_ref()
            .map(|s| s.expose_secret().as_str())
            .unwrap_or("")
    }

    /// Base URL, falling back to `default` and stripping a trailing slash.
    pub fn api_base_url_or(&self, default: &str) -> String {
        self.api_base_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or(default)
            .trim_end_matches('/')
            .to_string()
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.webhook_secret().is_none() {
            return Err(ValidationError::MissingWebhookSecret(
                self.provider_name.clone(),
            ));
        }
        if let Some(url) = &self.api_base_url {
            if !url.starts_with("https://") && !url.starts_with("http://") {
                return Err(ValidationError::InvalidApiBaseUrl(self.provider_name.clone()));
            }
        }
        Ok(())
    }
}

/// Billing configuration: one optional section per supported provider.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BillingConfig {
    #[serde(default)]
    pub stripe: Option<ProviderConfig>,

    #[serde(default)]
    pub lemonsqueezy: Option<ProviderConfig>,

    #[serde(default)]
    pub kofi: Option<ProviderConfig>,

    /// Timeout for provider enrichment calls in seconds
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
}

impl BillingConfig {
    /// Configured providers with `provider_name` defaulted from the section.
    pub fn providers(&self) -> Vec<ProviderConfig> {
        [
            ("stripe", &self.stripe),
            ("lemonsqueezy", &self.lemonsqueezy),
            ("kofi", &self.kofi),
        ]
        .into_iter()
        .filter_map(|(name, section)| {
            section.clone().map(|mut cfg| {
                if cfg.provider_name.trim().is_empty() {
                    cfg.provider_name = name.to_string();
                }
                cfg
            })
        })
        .collect()
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Validate billing configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.http_timeout_secs == 0 || self.http_timeout_secs > 60 {
            return Err(ValidationError::InvalidHttpTimeout);
        }
        for provider in self.providers() {
            provider.validate()?;
        }
        if let Some(secret) = self.stripe.as_ref().and_then(|s| s.webhook_secret()) {
            if !secret.starts_with("whsec_") {
                return Err(ValidationError::InvalidStripeWebhookSecret);
            }
        }
        Ok(())
    }
}

fn default_http_timeout() -> u64 {
    10
}
