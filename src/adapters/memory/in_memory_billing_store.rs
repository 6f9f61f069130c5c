//! In-Memory Billing Store Adapter
//!
//! Enforces the same uniqueness and pagination rules as the PostgreSQL store
//! under a single write lock. Used by tests and by the binary when no
//! database is configured.

use async_trait::async_trait;
use std::cmp::Ordering;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::billing::{
    normalize_email, BillingEvent, Page, PageRequest, SortOrder, Subscription,
};
use crate::domain::foundation::{
    BillingEventId, DomainError, ErrorCode, SubscriptionId, Timestamp, UserId,
};
use crate::adapters::clock::SystemClock;
use crate::ports::{BillingEventFilter, BillingStore, Clock, SubscriptionFilter};

#[derive(Debug, Default)]
struct StoreState {
    subscriptions: Vec<Subscription>,
    billing_events: Vec<BillingEvent>,
}

/// In-memory `BillingStore`. Clones share state.
#[derive(Clone)]
pub struct InMemoryBillingStore {
    state: Arc<RwLock<StoreState>>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for InMemoryBillingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBillingStore").finish_non_exhaustive()
    }
}

impl Default for InMemoryBillingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBillingStore {
    pub fn new() -> Self {
        Self {
            state: Arc::default(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Clock used for timestamps the store writes itself.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Number of stored subscriptions
    pub async fn subscription_count(&self) -> usize {
        self.state.read().await.subscriptions.len()
    }

    /// Number of stored billing events
    pub async fn billing_event_count(&self) -> usize {
        self.state.read().await.billing_events.len()
    }

    /// Snapshot of every subscription, in insertion order
    pub async fn all_subscriptions(&self) -> Vec<Subscription> {
        self.state.read().await.subscriptions.clone()
    }

    /// Snapshot of every billing event, in insertion order
    pub async fn all_billing_events(&self) -> Vec<BillingEvent> {
        self.state.read().await.billing_events.clone()
    }
}

fn compare(order: SortOrder, a: (Timestamp, Timestamp), b: (Timestamp, Timestamp)) -> Ordering {
    let (a_created, a_updated) = a;
    let (b_created, b_updated) = b;
    match order {
        SortOrder::CreatedAtAsc => a_created.cmp(&b_created),
        SortOrder::CreatedAtDesc => b_created.cmp(&a_created),
        SortOrder::UpdatedAtAsc => a_updated.cmp(&b_updated),
        SortOrder::UpdatedAtDesc => b_updated.cmp(&a_updated),
    }
}

fn paginate<T: Clone>(mut items: Vec<T>, page: &PageRequest) -> Result<Page<T>, DomainError> {
    let total = items.len() as u64;
    page.ensure_in_range(total)?;
    let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
    let slice: Vec<T> = if offset >= items.len() {
        Vec::new()
    } else {
        items
            .drain(offset..)
            .take(page.per_page() as usize)
            .collect()
    };
    Ok(Page::new(slice, total, page))
}

#[async_trait]
impl BillingStore for InMemoryBillingStore {
    async fn create_subscription(&self, subscription: &Subscription) -> Result<(), DomainError> {
        let mut state = self.state.write().await;
        let duplicate = state.subscriptions.iter().any(|s| {
            s.id == subscription.id
                || (s.integrator == subscription.integrator
                    && s.integrator_subscription_id == subscription.integrator_subscription_id)
        });
        if duplicate {
            return Err(DomainError::new(
                ErrorCode::DuplicateSubscription,
                format!(
                    "Subscription {}/{} already exists",
                    subscription.integrator, subscription.integrator_subscription_id
                ),
            ));
        }
        let mut stored = subscription.clone();
        stored.email = stored.email.as_deref().map(normalize_email);
        state.subscriptions.push(stored);
        Ok(())
    }

    async fn update_subscription(&self, subscription: &Subscription) -> Result<(), DomainError> {
        let mut state = self.state.write().await;
        let slot = state
            .subscriptions
            .iter_mut()
            .find(|s| s.id == subscription.id)
            .ok_or_else(|| {
                DomainError::new(ErrorCode::SubscriptionNotFound, "Subscription not found")
            })?;
        *slot = subscription.clone();
        slot.email = slot.email.as_deref().map(normalize_email);
        Ok(())
    }

    async fn delete_subscription(&self, id: &SubscriptionId) -> Result<(), DomainError> {
        let mut state = self.state.write().await;
        let before = state.subscriptions.len();
        state.subscriptions.retain(|s| s.id != *id);
        if state.subscriptions.len() == before {
            return Err(DomainError::new(
                ErrorCode::SubscriptionNotFound,
                "Subscription not found",
            ));
        }
        Ok(())
    }

    async fn get_subscription_by_id(
        &self,
        id: &SubscriptionId,
    ) -> Result<Option<Subscription>, DomainError> {
        let state = self.state.read().await;
        Ok(state.subscriptions.iter().find(|s| s.id == *id).cloned())
    }

    async fn get_subscription_by_integrator_id(
        &self,
        integrator: &str,
        integrator_subscription_id: &str,
    ) -> Result<Option<Subscription>, DomainError> {
        let state = self.state.read().await;
        Ok(state
            .subscriptions
            .iter()
            .find(|s| {
                s.integrator == integrator
                    && s.integrator_subscription_id == integrator_subscription_id
            })
            .cloned())
    }

    async fn get_subscriptions(
        &self,
        filter: &SubscriptionFilter,
        page: &PageRequest,
        order: SortOrder,
    ) -> Result<Page<Subscription>, DomainError> {
        let state = self.state.read().await;
        let mut matching: Vec<Subscription> = state
            .subscriptions
            .iter()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        matching.sort_by(|a, b| compare(order, (a.created_at, a.updated_at), (b.created_at, b.updated_at)));
        paginate(matching, page)
    }

    async fn get_total_subscriptions(
        &self,
        filter: &SubscriptionFilter,
    ) -> Result<u64, DomainError> {
        let state = self.state.read().await;
        Ok(state.subscriptions.iter().filter(|s| filter.matches(s)).count() as u64)
    }

    async fn get_subscriptions_by_email(
        &self,
        email: &str,
    ) -> Result<Vec<Subscription>, DomainError> {
        let email = normalize_email(email);
        let state = self.state.read().await;
        Ok(state
            .subscriptions
            .iter()
            .filter(|s| s.email.as_deref() == Some(email.as_str()))
            .cloned()
            .collect())
    }

    async fn associate_subscriptions_with_user(
        &self,
        user_id: &UserId,
        email: &str,
    ) -> Result<u64, DomainError> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Ok(0);
        }
        let now = self.clock.now();
        let mut state = self.state.write().await;
        let mut updated = 0;
        for sub in state
            .subscriptions
            .iter_mut()
            .filter(|s| s.is_orphaned() && s.email.as_deref() == Some(email.as_str()))
        {
            sub.associate(user_id.clone(), now);
            updated += 1;
        }
        Ok(updated)
    }

    async fn create_billing_event(&self, event: &BillingEvent) -> Result<(), DomainError> {
        let mut state = self.state.write().await;
        let duplicate = state.billing_events.iter().any(|e| {
            e.id == event.id
                || (e.integrator == event.integrator
                    && e.integrator_event_id == event.integrator_event_id)
        });
        if duplicate {
            return Err(DomainError::new(
                ErrorCode::DuplicateBillingEvent,
                format!(
                    "Billing event {}/{} already recorded",
                    event.integrator, event.integrator_event_id
                ),
            ));
        }
        state.billing_events.push(event.clone());
        Ok(())
    }

    async fn get_billing_event_by_id(
        &self,
        id: &BillingEventId,
    ) -> Result<Option<BillingEvent>, DomainError> {
        let state = self.state.read().await;
        Ok(state.billing_events.iter().find(|e| e.id == *id).cloned())
    }

    async fn get_billing_events(
        &self,
        filter: &BillingEventFilter,
        page: &PageRequest,
        order: SortOrder,
    ) -> Result<Page<BillingEvent>, DomainError> {
        let state = self.state.read().await;
        let mut matching: Vec<BillingEvent> = state
            .billing_events
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        matching.sort_by(|a, b| compare(order, (a.created_at, a.updated_at), (b.created_at, b.updated_at)));
        paginate(matching, page)
    }

    async fn get_total_billing_events(
        &self,
        filter: &BillingEventFilter,
    ) -> Result<u64, DomainError> {
        let state = self.state.read().await;
        Ok(state.billing_events.iter().filter(|e| filter.matches(e)).count() as u64)
    }

    async fn get_first_successful_billing_event_with_plan_name(
        &self,
        integrator: &str,
        integrator_subscription_id: &str,
    ) -> Result<Option<BillingEvent>, DomainError> {
        let state = self.state.read().await;
        Ok(state
            .billing_events
            .iter()
            .filter(|e| {
                e.integrator == integrator
                    && e.integrator_subscription_id.as_deref() == Some(integrator_subscription_id)
                    && e.event_type.is_successful_payment()
                    && e.plan_name.as_deref().is_some_and(|p| !p.trim().is_empty())
            })
            .min_by_key(|e| (e.provider_event_time, e.created_at))
            .cloned())
    }
}
