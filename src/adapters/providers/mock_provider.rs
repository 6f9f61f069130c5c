//! Mock payment provider for tests.
//!
//! Returns a preset event from `parse` and can be told to fail either step.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::domain::billing::{BillingError, NormalizedEvent};
use crate::ports::{PaymentProvider, SubscriptionInfo, WebhookRequest};

/// Scriptable `PaymentProvider`. Its name is `mock-<wrapped>`.
#[derive(Debug, Clone)]
pub struct MockProvider {
    name: String,
    event: Option<NormalizedEvent>,
    subscription: Option<SubscriptionInfo>,
    verify_error: Option<BillingError>,
    parse_error: Option<BillingError>,
    verify_calls: Arc<AtomicUsize>,
    parse_calls: Arc<AtomicUsize>,
}

impl MockProvider {
    pub fn new(wrapped: &str) -> Self {
        Self {
            name: format!("mock-{}", wrapped),
            event: None,
            subscription: None,
            verify_error: None,
            parse_error: None,
            verify_calls: Arc::new(AtomicUsize::new(0)),
            parse_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Event returned by every `parse` call.
    pub fn with_event(mut self, event: NormalizedEvent) -> Self {
        self.event = Some(event);
        self
    }

    pub fn with_subscription(mut self, info: SubscriptionInfo) -> Self {
        self.subscription = Some(info);
        self
    }

    pub fn failing_verify(mut self, error: BillingError) -> Self {
        self.verify_error = Some(error);
        self
    }

    pub fn failing_parse(mut self, error: BillingError) -> Self {
        self.parse_error = Some(error);
        self
    }

    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    pub fn parse_calls(&self) -> usize {
        self.parse_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn verify(&self, _request: &WebhookRequest) -> Result<(), BillingError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        match &self.verify_error {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    async fn parse(&self, request: &WebhookRequest) -> Result<NormalizedEvent, BillingError> {
        self.parse_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = &self.parse_error {
            return Err(error.clone());
        }
        let mut event = self
            .event
            .clone()
            .ok_or_else(|| BillingError::parsing("mock provider has no preset event"))?;
        if event.raw_payload.is_empty() {
            event.raw_payload = request.body.clone();
        }
        Ok(event)
    }

    async fn lookup_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<SubscriptionInfo, BillingError> {
        self.subscription
            .clone()
            .filter(|info| info.subscription_id == subscription_id)
            .ok_or_else(|| BillingError::NotFound(format!("subscription {}", subscription_id)))
    }
}
