//! GetSubscriptionStatusHandler - Query handler for a user's current subscription.
//!
//! Falls back to the user's email when nothing is linked to the id yet and
//! attaches any orphaned subscriptions it finds that way.

use std::sync::Arc;

use serde::Serialize;

use super::access::{authorize, parse_target_user};
use crate::domain::billing::{BillingError, PageRequest, SortOrder, Subscription};
use crate::domain::foundation::{Timestamp, UserId};
use crate::ports::{BillingStore, SubscriptionFilter, UserDirectory};

/// Query for the most recent subscription of `target_user`.
#[derive(Debug, Clone)]
pub struct GetSubscriptionStatusQuery {
    pub target_user: String,
    pub requesting_user: UserId,
}

/// Flattened subscription state for clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionStatusView {
    pub has_subscription: bool,
    pub subscription_id: Option<String>,
    pub provider: Option<String>,
    pub provider_subscription_id: Option<String>,
    pub status: Option<String>,
    pub plan_name: Option<String>,
    pub amount: i64,
    pub currency: Option<String>,
    pub billing_interval: Option<String>,
    pub next_billing_date: Option<Timestamp>,
    pub available_until_date: Option<Timestamp>,
    pub trial_ends_at: Option<Timestamp>,
    pub cancelled_at: Option<Timestamp>,
    pub is_active: bool,
    pub is_in_good_standing: bool,
}

impl SubscriptionStatusView {
    pub fn none() -> Self {
        Self {
            has_subscription: false,
            subscription_id: None,
            provider: None,
            provider_subscription_id: None,
            status: None,
            plan_name: None,
            amount: 0,
            currency: None,
            billing_interval: None,
            next_billing_date: None,
            available_until_date: None,
            trial_ends_at: None,
            cancelled_at: None,
            is_active: false,
            is_in_good_standing: false,
        }
    }
}

impl From<&Subscription> for SubscriptionStatusView {
    fn from(sub: &Subscription) -> Self {
        let active = sub.status.is_active();
        Self {
            has_subscription: true,
            subscription_id: Some(sub.id.to_string()),
            provider: Some(sub.integrator.clone()),
            provider_subscription_id: Some(sub.integrator_subscription_id.clone()),
            status: Some(sub.status.as_str().to_string()),
            plan_name: sub.plan_name.clone(),
            amount: sub.amount,
            currency: Some(sub.currency.clone()).filter(|c| !c.is_empty()),
            billing_interval: sub.billing_interval.clone(),
            next_billing_date: sub.next_billing_date,
            available_until_date: sub.available_until_date,
            trial_ends_at: sub.trial_ends_at,
            cancelled_at: sub.cancelled_at,
            is_active: active,
            is_in_good_standing: active,
        }
    }
}

/// Finds the user's latest subscription, associating orphans by email when
/// the user has none yet.
pub(crate) async fn latest_subscription(
    store: &dyn BillingStore,
    directory: Option<&dyn UserDirectory>,
    user_id: &UserId,
) -> Result<Option<Subscription>, BillingError> {
    if let Some(sub) = newest_for_user(store, user_id).await? {
        return Ok(Some(sub));
    }

    let Some(directory) = directory else {
        return Ok(None);
    };
    let email = match directory.get_user_by_id(user_id).await? {
        Some(user) if !user.email.trim().is_empty() => user.email,
        _ => return Ok(None),
    };
    if store.get_subscriptions_by_email(&email).await?.is_empty() {
        return Ok(None);
    }

    let attached = store.associate_subscriptions_with_user(user_id, &email).await?;
    if attached > 0 {
        tracing::info!(user_id = %user_id, count = attached, "Associated orphaned subscriptions");
    }
    newest_for_user(store, user_id).await
}

async fn newest_for_user(
    store: &dyn BillingStore,
    user_id: &UserId,
) -> Result<Option<Subscription>, BillingError> {
    let page = store
        .get_subscriptions(
            &SubscriptionFilter::for_user(user_id.clone()),
            &PageRequest::new(Some(1), Some(1)),
            SortOrder::CreatedAtDesc,
        )
        .await?;
    Ok(page.items.into_iter().next())
}

/// Handler for the subscription status read.
pub struct GetSubscriptionStatusHandler {
    store: Arc<dyn BillingStore>,
    directory: Option<Arc<dyn UserDirectory>>,
}

impl GetSubscriptionStatusHandler {
    pub fn new(store: Arc<dyn BillingStore>, directory: Option<Arc<dyn UserDirectory>>) -> Self {
        Self { store, directory }
    }

    pub async fn handle(
        &self,
        query: GetSubscriptionStatusQuery,
    ) -> Result<SubscriptionStatusView, BillingError> {
        let target = parse_target_user(&query.target_user)?;
        let directory = self.directory.as_deref();
        authorize(directory, &target, &query.requesting_user).await?;

        let view = latest_subscription(self.store.as_ref(), directory, &target)
            .await?
            .map(|sub| SubscriptionStatusView::from(&sub))
            .unwrap_or_else(SubscriptionStatusView::none);
        Ok(view)
    }
}
