//! Subscription aggregate.
//!
//! One row per `(integrator, integrator_subscription_id)`. Created from the
//! first event that references a vendor subscription, then mutated by every
//! later event for it. The owning user may be unknown at creation time; such
//! orphans keep the customer email until an association attaches a user.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{EventType, NormalizedEvent, SubscriptionStatus};
use crate::domain::foundation::{SubscriptionId, Timestamp, UserId, ValidationError};

/// Lower-cases and trims an email address.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Subscription state tracked for a user at one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    /// `None` while orphaned.
    pub user_id: Option<UserId>,
    /// Always stored lower-case.
    pub email: Option<String>,
    pub status: SubscriptionStatus,

    pub integrator: String,
    pub integrator_subscription_id: String,
    pub integrator_customer_id: Option<String>,

    pub plan_name: Option<String>,
    pub plan_id: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub billing_interval: Option<String>,

    pub next_billing_date: Option<Timestamp>,
    pub available_until_date: Option<Timestamp>,
    pub trial_ends_at: Option<Timestamp>,
    pub cancelled_at: Option<Timestamp>,
    pub provider_created_at: Option<Timestamp>,
    pub provider_updated_at: Option<Timestamp>,

    pub cancel_url: Option<String>,
    pub update_url: Option<String>,
    pub metadata: HashMap<String, String>,

    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Subscription {
    /// Builds a new subscription from the first event seen for it.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` when the event carries no vendor
    /// subscription id or the integrator is blank.
    pub fn from_event(
        id: SubscriptionId,
        user_id: Option<UserId>,
        integrator: &str,
        event: &NormalizedEvent,
        now: Timestamp,
    ) -> Result<Self, ValidationError> {
        if integrator.trim().is_empty() {
            return Err(ValidationError::empty_field("integrator"));
        }
        let integrator_subscription_id = event
            .subscription_id
            .clone()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ValidationError::empty_field("subscription_id"))?;

        let status = event.status.clone().unwrap_or(SubscriptionStatus::Active);
        let cancelled_at = if event.event_type == EventType::SubscriptionCancelled
            || status == SubscriptionStatus::Cancelled
        {
            Some(now)
        } else {
            None
        };

        Ok(Self {
            id,
            user_id,
            email: event.customer_email.as_deref().map(normalize_email),
            status,
            integrator: integrator.to_string(),
            integrator_subscription_id,
            integrator_customer_id: event.customer_id.clone(),
            plan_name: event.plan_name.clone(),
            plan_id: event.plan_id.clone(),
            amount: event.amount,
            currency: event.currency.clone(),
            billing_interval: event.billing_interval.clone(),
            next_billing_date: event.next_billing_date,
            available_until_date: event.available_until_date,
            trial_ends_at: event.trial_ends_at,
            cancelled_at,
            provider_created_at: event.provider_created_at,
            provider_updated_at: event.provider_updated_at,
            cancel_url: event.cancel_url.clone(),
            update_url: event.update_url.clone(),
            metadata: event.metadata.clone(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Applies a later event to this subscription.
    ///
    /// Fields the event leaves empty are kept. `cancelled_at` is set once and
    /// never cleared, even when a later event moves the status back to
    /// active. Returns `true` when a cancelled or expired subscription was
    /// moved back into an active state.
    pub fn apply_event(&mut self, event: &NormalizedEvent, now: Timestamp) -> bool {
        let mut reactivated = false;
        if let Some(status) = &event.status {
            reactivated = self.status.is_terminal() && status.is_active();
            self.status = status.clone();
        }

        if let Some(date) = event.next_billing_date {
            self.next_billing_date = Some(date);
        }
        if let Some(date) = event.available_until_date {
            self.available_until_date = Some(date);
        }
        if let Some(date) = event.trial_ends_at {
            self.trial_ends_at = Some(date);
        }
        if let Some(plan) = &event.plan_name {
            self.plan_name = Some(plan.clone());
        }
        if let Some(plan_id) = &event.plan_id {
            self.plan_id = Some(plan_id.clone());
        }
        if let Some(interval) = &event.billing_interval {
            self.billing_interval = Some(interval.clone());
        }
        if let Some(url) = &event.cancel_url {
            self.cancel_url = Some(url.clone());
        }
        if let Some(url) = &event.update_url {
            self.update_url = Some(url.clone());
        }
        if let Some(email) = &event.customer_email {
            self.email = Some(normalize_email(email));
        }
        if self.integrator_customer_id.is_none() {
            self.integrator_customer_id = event.customer_id.clone();
        }
        if event.event_type.is_subscription_lifecycle() && event.amount > 0 {
            self.amount = event.amount;
            if !event.currency.is_empty() {
                self.currency = event.currency.clone();
            }
        }
        if event.provider_updated_at.is_some() {
            self.provider_updated_at = event.provider_updated_at;
        }
        for (key, value) in &event.metadata {
            self.metadata.insert(key.clone(), value.clone());
        }

        let cancelled = event.event_type == EventType::SubscriptionCancelled
            || self.status == SubscriptionStatus::Cancelled;
        if cancelled && self.cancelled_at.is_none() {
            self.cancelled_at = Some(now);
        }

        self.updated_at = now;
        reactivated
    }

    /// True when no user owns this subscription yet.
    pub fn is_orphaned(&self) -> bool {
        self.user_id.is_none()
    }

    /// Attaches an owner to an orphaned subscription.
    pub fn associate(&mut self, user_id: UserId, now: Timestamp) {
        self.user_id = Some(user_id);
        self.updated_at = now;
    }
}
