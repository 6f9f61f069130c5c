//! ReconciliationEngine - Command handler for inbound payment webhooks.
//!
//! One webhook runs through five phases:
//!
//! - **A** resolve the owning user (stored subscription, directory, email)
//! - **B** find or create the Subscription for subscription-bound events
//! - **C** apply the event to that Subscription
//! - **D** append the BillingEvent; a duplicate means the delivery was
//!   already acknowledged
//! - **E** write an audit entry
//!
//! The engine keeps no state between requests. Concurrent deliveries are
//! serialized only by the store's uniqueness constraints.

use std::sync::Arc;

use crate::adapters::providers::ProviderRegistry;
use crate::domain::billing::{BillingError, BillingEvent, NormalizedEvent, Subscription};
use crate::domain::foundation::{BillingEventId, ErrorCode, SubscriptionId, Timestamp, UserId};
use crate::ports::{
    AuditActor, AuditEntry, AuditSink, BillingStore, Clock, PaymentProvider, UserDirectory,
    WebhookRequest,
};

/// Command to ingest one raw webhook.
#[derive(Debug, Clone)]
pub struct ProcessWebhookCommand {
    pub provider_name: String,
    pub request: WebhookRequest,
}

/// Outcome of a processed webhook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessWebhookResult {
    pub integrator: String,
    pub event_id: String,
    pub subscription_id: Option<SubscriptionId>,
    pub user_id: Option<UserId>,
    /// A Subscription was created by this delivery.
    pub subscription_created: bool,
    /// The event id had already been recorded.
    pub duplicate: bool,
    /// The BillingEvent exists after this delivery.
    pub billing_event_recorded: bool,
}

/// How Phase A identified the owner.
#[derive(Debug)]
struct Resolution {
    user_id: Option<UserId>,
    existing: Option<Subscription>,
}

/// Outcome of Phase D.
#[derive(Debug)]
enum RecordOutcome {
    Recorded,
    Duplicate,
    Failed(String),
}

/// Reconciles normalized provider events into subscriptions and billing
/// history.
pub struct ReconciliationEngine {
    registry: Arc<ProviderRegistry>,
    store: Arc<dyn BillingStore>,
    directory: Option<Arc<dyn UserDirectory>>,
    audit: Option<Arc<dyn AuditSink>>,
    clock: Arc<dyn Clock>,
}

impl ReconciliationEngine {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        store: Arc<dyn BillingStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            store,
            directory: None,
            audit: None,
            clock,
        }
    }

    pub fn with_directory(mut self, directory: Arc<dyn UserDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Verifies, parses and reconciles a raw webhook.
    ///
    /// Verification and parse failures return before anything is written.
    pub async fn handle(
        &self,
        cmd: ProcessWebhookCommand,
    ) -> Result<ProcessWebhookResult, BillingError> {
        let provider = self.registry.get(&cmd.provider_name)?;
        self.ingest(provider.as_ref(), &cmd.request).await
    }

    /// Runs one webhook through a specific provider.
    pub async fn ingest(
        &self,
        provider: &dyn PaymentProvider,
        request: &WebhookRequest,
    ) -> Result<ProcessWebhookResult, BillingError> {
        tracing::debug!(provider = %provider.name(), bytes = request.body.len(), "Webhook received");

        if let Err(e) = provider.verify(request).await {
            tracing::warn!(provider = %provider.name(), error = %e, "Webhook verification failed");
            return Err(e);
        }

        let mut event = provider.parse(request).await.map_err(|e| {
            tracing::warn!(provider = %provider.name(), error = %e, "Webhook parsing failed");
            e
        })?;
        if event.raw_payload.is_empty() {
            event.raw_payload = request.body.clone();
        }

        self.process(provider.name(), event).await
    }

    /// Reconciles an already normalized event (phases A to E).
    pub async fn process(
        &self,
        integrator: &str,
        mut event: NormalizedEvent,
    ) -> Result<ProcessWebhookResult, BillingError> {
        let now = self.clock.now();

        // Phase A
        let resolution = self.resolve_user(integrator, &event).await?;
        let user_id = resolution.user_id.clone();

        // Phases B and C
        let mut subscription_created = false;
        let mut subscription: Option<Subscription> = None;
        if event.is_subscription_bound() {
            let (sub, created) = self
                .find_or_create_subscription(integrator, &event, resolution, now)
                .await?;
            subscription_created = created;
            let sub = if created {
                sub
            } else {
                self.apply_event(sub, &event, now).await?
            };
            subscription = Some(sub);
        }

        if event.plan_name.is_none() {
            event.plan_name = self.known_plan_name(integrator, &event, subscription.as_ref()).await;
        }

        // Phase D
        let subscription_id = subscription.as_ref().map(|s| s.id);
        let record = BillingEvent::from_event(
            BillingEventId::new(),
            integrator,
            &event,
            subscription_id,
            user_id.clone(),
            now,
        );
        let outcome = match self.store.create_billing_event(&record).await {
            Ok(()) => RecordOutcome::Recorded,
            Err(e) if e.code == ErrorCode::DuplicateBillingEvent => {
                tracing::info!(
                    provider = %integrator,
                    event_id = %event.event_id,
                    "Duplicate delivery absorbed"
                );
                RecordOutcome::Duplicate
            }
            Err(e) => {
                tracing::error!(
                    provider = %integrator,
                    event_id = %event.event_id,
                    error = %e,
                    "Failed to record billing event"
                );
                RecordOutcome::Failed(e.to_string())
            }
        };

        // Phase E
        self.audit(integrator, &event, subscription_id, user_id.as_ref(), &outcome, now)
            .await;

        Ok(ProcessWebhookResult {
            integrator: integrator.to_string(),
            event_id: event.event_id,
            subscription_id,
            user_id,
            subscription_created,
            duplicate: matches!(outcome, RecordOutcome::Duplicate),
            billing_event_recorded: !matches!(outcome, RecordOutcome::Failed(_)),
        })
    }

    async fn resolve_user(
        &self,
        integrator: &str,
        event: &NormalizedEvent,
    ) -> Result<Resolution, BillingError> {
        let existing = match event.subscription_id.as_deref() {
            Some(sub_id) => {
                self.store
                    .get_subscription_by_integrator_id(integrator, sub_id)
                    .await?
            }
            None => None,
        };

        if let Some(user_id) = existing.as_ref().and_then(|s| s.user_id.clone()) {
            tracing::debug!(user_id = %user_id, "User resolved from stored subscription");
            return Ok(Resolution {
                user_id: Some(user_id),
                existing,
            });
        }

        // A stored orphan still carries the email the event may omit.
        let email = event
            .customer_email
            .clone()
            .or_else(|| existing.as_ref().and_then(|s| s.email.clone()))
            .filter(|e| !e.trim().is_empty());

        let Some(email) = email else {
            return Err(BillingError::NoUserIdentifyingInformationInPayload);
        };

        if let Some(directory) = &self.directory {
            match directory.get_user_by_email(&email).await {
                Ok(Some(user)) => {
                    tracing::debug!(user_id = %user.id, "User resolved from directory");
                    return Ok(Resolution {
                        user_id: Some(user.id),
                        existing,
                    });
                }
                Ok(None) => {}
                Err(e) => return Err(BillingError::UnableToResolveUserId(e.to_string())),
            }
        }

        tracing::debug!(provider = %integrator, "No user for customer email, continuing as orphan");
        Ok(Resolution {
            user_id: None,
            existing,
        })
    }

    async fn find_or_create_subscription(
        &self,
        integrator: &str,
        event: &NormalizedEvent,
        resolution: Resolution,
        now: Timestamp,
    ) -> Result<(Subscription, bool), BillingError> {
        if let Some(existing) = resolution.existing {
            return Ok((existing, false));
        }

        let subscription = Subscription::from_event(
            SubscriptionId::new(),
            resolution.user_id,
            integrator,
            event,
            now,
        )
        .map_err(BillingError::parsing)?;

        match self.store.create_subscription(&subscription).await {
            Ok(()) => {
                if subscription.is_orphaned() {
                    tracing::info!(
                        provider = %integrator,
                        subscription_id = %subscription.id,
                        "Created orphaned subscription"
                    );
                } else {
                    tracing::info!(
                        provider = %integrator,
                        subscription_id = %subscription.id,
                        "Subscription created"
                    );
                }
                Ok((subscription, true))
            }
            Err(e) if e.code == ErrorCode::DuplicateSubscription => {
                // Lost the create race; continue with the winner's row.
                let winner = self
                    .store
                    .get_subscription_by_integrator_id(
                        integrator,
                        &subscription.integrator_subscription_id,
                    )
                    .await?
                    .ok_or_else(|| {
                        BillingError::Internal(format!(
                            "Subscription {} vanished after duplicate insert",
                            subscription.integrator_subscription_id
                        ))
                    })?;
                Ok((winner, false))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn apply_event(
        &self,
        mut subscription: Subscription,
        event: &NormalizedEvent,
        now: Timestamp,
    ) -> Result<Subscription, BillingError> {
        let previous = subscription.status.clone();
        if subscription.apply_event(event, now) {
            tracing::warn!(
                subscription_id = %subscription.id,
                from = %previous,
                to = %subscription.status,
                "Terminal subscription reactivated"
            );
        }
        self.store.update_subscription(&subscription).await?;
        Ok(subscription)
    }

    /// Plan name for events that carry none: the subscription's, else the
    /// earliest successful payment's.
    async fn known_plan_name(
        &self,
        integrator: &str,
        event: &NormalizedEvent,
        subscription: Option<&Subscription>,
    ) -> Option<String> {
        if let Some(plan) = subscription.and_then(|s| s.plan_name.clone()) {
            return Some(plan);
        }
        let sub_id = event.subscription_id.as_deref()?;
        match self
            .store
            .get_first_successful_billing_event_with_plan_name(integrator, sub_id)
            .await
        {
            Ok(first) => first.and_then(|e| e.plan_name),
            Err(e) => {
                tracing::debug!(error = %e, "Plan name lookup failed");
                None
            }
        }
    }

    async fn audit(
        &self,
        integrator: &str,
        event: &NormalizedEvent,
        subscription_id: Option<SubscriptionId>,
        user_id: Option<&UserId>,
        outcome: &RecordOutcome,
        now: Timestamp,
    ) {
        let Some(sink) = &self.audit else {
            return;
        };
        let (recorded, raw_payload, error) = match outcome {
            RecordOutcome::Recorded | RecordOutcome::Duplicate => (true, None, None),
            RecordOutcome::Failed(error) => {
                (false, Some(event.raw_payload_text()), Some(error.clone()))
            }
        };
        let entry = AuditEntry {
            action: event.event_type.as_str().to_string(),
            actor: AuditActor::System,
            target: event.event_id.clone(),
            provider: integrator.to_string(),
            subscription_id,
            user_id: user_id.cloned(),
            billing_event_recorded: recorded,
            raw_payload,
            error,
            recorded_at: now,
        };
        if let Err(e) = sink.log(entry).await {
            tracing::warn!(
                provider = %integrator,
                event_id = %event.event_id,
                error = %e,
                "Audit write failed"
            );
        }
    }
}
