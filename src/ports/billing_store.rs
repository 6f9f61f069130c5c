//! Billing store port - persistence for Subscriptions and BillingEvents.
//!
//! # Uniqueness
//!
//! Implementations must enforce two keys at the storage level:
//!
//! - `(integrator, integrator_subscription_id)` on subscriptions; a second
//!   insert fails with `ErrorCode::DuplicateSubscription`.
//! - `(integrator, integrator_event_id)` on billing events; a second insert
//!   fails with `ErrorCode::DuplicateBillingEvent`.
//!
//! These constraints are what make concurrent webhook deliveries safe; the
//! reconciliation handler holds no locks of its own.
//!
//! # Pagination
//!
//! Listing operations take a [`PageRequest`] and fail with
//! `ErrorCode::PageOutOfRange` for pages past the end (page 1 of an empty
//! result is not an error).

use async_trait::async_trait;

use crate::domain::billing::{
    normalize_email, BillingEvent, EventType, Page, PageRequest, SortOrder, Subscription,
    SubscriptionStatus,
};
use crate::domain::foundation::{BillingEventId, DomainError, SubscriptionId, Timestamp, UserId};

/// Filter for subscription listings. Empty collections and `None` match all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionFilter {
    pub user_ids: Vec<UserId>,
    /// Compared against the normalized email.
    pub emails: Vec<String>,
    pub integrator: Option<String>,
    pub statuses: Vec<SubscriptionStatus>,
    pub currency: Option<String>,
    pub billing_interval: Option<String>,
    /// Case-insensitive substring of the plan name.
    pub plan_name_contains: Option<String>,
    pub created_after: Option<Timestamp>,
    pub created_before: Option<Timestamp>,
    pub next_billing_after: Option<Timestamp>,
    pub next_billing_before: Option<Timestamp>,
}

impl SubscriptionFilter {
    pub fn for_user(user_id: UserId) -> Self {
        Self {
            user_ids: vec![user_id],
            ..Self::default()
        }
    }

    pub fn for_email(email: &str) -> Self {
        Self {
            emails: vec![normalize_email(email)],
            ..Self::default()
        }
    }

    /// Evaluates the filter in memory.
    pub fn matches(&self, sub: &Subscription) -> bool {
        if !self.user_ids.is_empty()
            && !sub
                .user_id
                .as_ref()
                .is_some_and(|id| self.user_ids.contains(id))
        {
            return false;
        }
        if !self.emails.is_empty() {
            let wanted: Vec<String> = self.emails.iter().map(|e| normalize_email(e)).collect();
            if !sub.email.as_ref().is_some_and(|e| wanted.contains(e)) {
                return false;
            }
        }
        if self
            .integrator
            .as_ref()
            .is_some_and(|i| *i != sub.integrator)
        {
            return false;
        }
        if !self.statuses.is_empty() && !self.statuses.contains(&sub.status) {
            return false;
        }
        if self
            .currency
            .as_ref()
            .is_some_and(|c| !c.eq_ignore_ascii_case(&sub.currency))
        {
            return false;
        }
        if let Some(interval) = &self.billing_interval {
            if sub.billing_interval.as_deref() != Some(interval.as_str()) {
                return false;
            }
        }
        if let Some(needle) = &self.plan_name_contains {
            let needle = needle.to_lowercase();
            if !sub
                .plan_name
                .as_ref()
                .is_some_and(|p| p.to_lowercase().contains(&needle))
            {
                return false;
            }
        }
        if self.created_after.is_some_and(|t| sub.created_at < t)
            || self.created_before.is_some_and(|t| sub.created_at > t)
        {
            return false;
        }
        if self.next_billing_after.is_some() || self.next_billing_before.is_some() {
            let Some(next) = sub.next_billing_date else {
                return false;
            };
            if self.next_billing_after.is_some_and(|t| next < t)
                || self.next_billing_before.is_some_and(|t| next > t)
            {
                return false;
            }
        }
        true
    }
}

/// Filter for billing event listings. Empty collections and `None` match all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BillingEventFilter {
    pub user_ids: Vec<UserId>,
    pub integrator: Option<String>,
    pub event_types: Vec<EventType>,
    pub subscription_ids: Vec<SubscriptionId>,
    pub integrator_subscription_id: Option<String>,
    pub created_after: Option<Timestamp>,
    pub created_before: Option<Timestamp>,
}

impl BillingEventFilter {
    pub fn for_user(user_id: UserId) -> Self {
        Self {
            user_ids: vec![user_id],
            ..Self::default()
        }
    }

    /// Evaluates the filter in memory.
    pub fn matches(&self, event: &BillingEvent) -> bool {
        if !self.user_ids.is_empty()
            && !event
                .user_id
                .as_ref()
                .is_some_and(|id| self.user_ids.contains(id))
        {
            return false;
        }
        if self
            .integrator
            .as_ref()
            .is_some_and(|i| *i != event.integrator)
        {
            return false;
        }
        if !self.event_types.is_empty() && !self.event_types.contains(&event.event_type) {
            return false;
        }
        if !self.subscription_ids.is_empty()
            && !event
                .subscription_id
                .as_ref()
                .is_some_and(|id| self.subscription_ids.contains(id))
        {
            return false;
        }
        if let Some(sub_id) = &self.integrator_subscription_id {
            if event.integrator_subscription_id.as_deref() != Some(sub_id.as_str()) {
                return false;
            }
        }
        !(self.created_after.is_some_and(|t| event.created_at < t)
            || self.created_before.is_some_and(|t| event.created_at > t))
    }
}

/// Persistence port for billing aggregates.
#[async_trait]
pub trait BillingStore: Send + Sync {
    // ───────────────────────────── Subscriptions ─────────────────────────────

    /// Inserts a subscription. Fails with `DuplicateSubscription` when the
    /// integrator key is taken.
    async fn create_subscription(&self, subscription: &Subscription) -> Result<(), DomainError>;

    /// Replaces a stored subscription. Fails with `SubscriptionNotFound`.
    async fn update_subscription(&self, subscription: &Subscription) -> Result<(), DomainError>;

    /// Administrative delete. Fails with `SubscriptionNotFound`.
    async fn delete_subscription(&self, id: &SubscriptionId) -> Result<(), DomainError>;

    async fn get_subscription_by_id(
        &self,
        id: &SubscriptionId,
    ) -> Result<Option<Subscription>, DomainError>;

    async fn get_subscription_by_integrator_id(
        &self,
        integrator: &str,
        integrator_subscription_id: &str,
    ) -> Result<Option<Subscription>, DomainError>;

    async fn get_subscriptions(
        &self,
        filter: &SubscriptionFilter,
        page: &PageRequest,
        order: SortOrder,
    ) -> Result<Page<Subscription>, DomainError>;

    async fn get_total_subscriptions(&self, filter: &SubscriptionFilter)
        -> Result<u64, DomainError>;

    /// All subscriptions whose normalized email matches.
    async fn get_subscriptions_by_email(&self, email: &str)
        -> Result<Vec<Subscription>, DomainError>;

    /// Attaches `user_id` to every orphaned subscription with this email.
    /// Atomic; returns how many were updated.
    async fn associate_subscriptions_with_user(
        &self,
        user_id: &UserId,
        email: &str,
    ) -> Result<u64, DomainError>;

    // ───────────────────────────── Billing events ────────────────────────────

    /// Appends a billing event. Fails with `DuplicateBillingEvent` when the
    /// integrator event id was already recorded.
    async fn create_billing_event(&self, event: &BillingEvent) -> Result<(), DomainError>;

    async fn get_billing_event_by_id(
        &self,
        id: &BillingEventId,
    ) -> Result<Option<BillingEvent>, DomainError>;

    async fn get_billing_events(
        &self,
        filter: &BillingEventFilter,
        page: &PageRequest,
        order: SortOrder,
    ) -> Result<Page<BillingEvent>, DomainError>;

    async fn get_total_billing_events(&self, filter: &BillingEventFilter)
        -> Result<u64, DomainError>;

    /// Earliest successful-payment event for a vendor subscription that
    /// carries a plan name.
    async fn get_first_successful_billing_event_with_plan_name(
        &self,
        integrator: &str,
        integrator_subscription_id: &str,
    ) -> Result<Option<BillingEvent>, DomainError>;
}
