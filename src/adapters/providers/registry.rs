//! Provider Registry - maps provider names to adapters.
//!
//! Built once at startup from configuration and shared read-only through
//! an `Arc`. Names are matched case-insensitively and known aliases
//! (`lemon-squeezy`, `Ko-fi`, ...) resolve to one canonical key.
//!
//! # Example
//!
//! ```ignore
//! let mut registry = ProviderRegistry::new();
//! registry.register(Arc::new(MockProvider::new("stripe")));
//! let provider = registry.get("mock-stripe")?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use crate::adapters::kofi::KofiProvider;
use crate::adapters::lemonsqueezy::LemonSqueezyProvider;
use crate::adapters::stripe::StripeProvider;
use crate::config::ProviderConfig;
use crate::domain::billing::{BillingError, NormalizedEvent};
use crate::ports::{Clock, PaymentProvider, ProviderHttpClient, WebhookRequest};

/// Provider adapters by name.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn PaymentProvider>>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}

fn registry_key(name: &str) -> String {
    let key = name.trim().to_ascii_lowercase();
    match key.as_str() {
        "lemon_squeezy" | "lemon-squeezy" => "lemonsqueezy".to_string(),
        "ko-fi" => "kofi".to_string(),
        _ => key,
    }
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds adapters for each configured provider.
    ///
    /// # Errors
    ///
    /// - `MissingProviderName` for an entry with a blank name
    /// - `UnsupportedProvider` for a name with no adapter
    /// - `MissingWebhookSecret` when an adapter has no secret
    pub fn from_configs(
        configs: &[ProviderConfig],
        http: Arc<dyn ProviderHttpClient>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, BillingError> {
        let mut registry = Self::new();
        for config in configs {
            // Adapters report the canonical name, so events and audit
            // entries carry it regardless of how the config spelled it.
            let canonical = ProviderConfig {
                provider_name: registry_key(&config.provider_name),
                ..config.clone()
            };
            let provider: Arc<dyn PaymentProvider> = match canonical.provider_name.as_str() {
                "" => return Err(BillingError::MissingProviderName),
                "stripe" => Arc::new(StripeProvider::new(&canonical, http.clone(), clock.clone())?),
                "lemonsqueezy" => Arc::new(LemonSqueezyProvider::new(&canonical, http.clone())?),
                "kofi" => Arc::new(KofiProvider::new(&canonical)?),
                other => return Err(BillingError::UnsupportedProvider(other.to_string())),
            };
            tracing::info!(provider = %provider.name(), "Registered payment provider");
            registry.register(provider);
        }
        Ok(registry)
    }

    /// Adds a provider under its own name, replacing any previous one.
    pub fn register(&mut self, provider: Arc<dyn PaymentProvider>) {
        let key = registry_key(provider.name());
        if self.providers.insert(key, provider).is_some() {
            tracing::debug!("Replaced registered payment provider");
        }
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn PaymentProvider>, BillingError> {
        self.providers
            .get(&registry_key(name))
            .cloned()
            .ok_or_else(|| BillingError::ProviderNotFound(name.to_string()))
    }

    /// Verifies then parses with the named provider.
    pub async fn verify_and_parse(
        &self,
        name: &str,
        request: &WebhookRequest,
    ) -> Result<NormalizedEvent, BillingError> {
        let provider = self.get(name)?;
        provider.verify(request).await?;
        provider.parse(request).await
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
