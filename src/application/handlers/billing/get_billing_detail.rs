//! GetBillingDetailHandler - Query handler for the billing summary panel.

use std::sync::Arc;

use serde::Serialize;

use super::access::{authorize, parse_target_user};
use super::get_subscription_status::latest_subscription;
use crate::domain::billing::{billing_summary, BillingError, Subscription};
use crate::domain::foundation::{Timestamp, UserId};
use crate::ports::{BillingStore, UserDirectory};

const NO_SUBSCRIPTION_SUMMARY: &str = "You don't have an active subscription";

/// Query for `target_user`'s billing detail.
#[derive(Debug, Clone)]
pub struct GetBillingDetailQuery {
    pub target_user: String,
    pub requesting_user: UserId,
}

/// Plan, status, provider links and a one-line summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BillingDetailView {
    pub has_subscription: bool,
    pub plan_name: Option<String>,
    pub status: Option<String>,
    pub provider: Option<String>,
    pub amount: i64,
    pub currency: Option<String>,
    pub billing_interval: Option<String>,
    pub next_billing_date: Option<Timestamp>,
    pub available_until_date: Option<Timestamp>,
    pub cancel_url: Option<String>,
    pub update_url: Option<String>,
    pub summary: String,
}

impl From<&Subscription> for BillingDetailView {
    fn from(sub: &Subscription) -> Self {
        Self {
            has_subscription: true,
            plan_name: sub.plan_name.clone(),
            status: Some(sub.status.as_str().to_string()),
            provider: Some(sub.integrator.clone()),
            amount: sub.amount,
            currency: Some(sub.currency.clone()).filter(|c| !c.is_empty()),
            billing_interval: sub.billing_interval.clone(),
            next_billing_date: sub.next_billing_date,
            available_until_date: sub.available_until_date,
            cancel_url: sub.cancel_url.clone(),
            update_url: sub.update_url.clone(),
            summary: billing_summary(sub),
        }
    }
}

impl BillingDetailView {
    fn none() -> Self {
        Self {
            has_subscription: false,
            plan_name: None,
            status: None,
            provider: None,
            amount: 0,
            currency: None,
            billing_interval: None,
            next_billing_date: None,
            available_until_date: None,
            cancel_url: None,
            update_url: None,
            summary: NO_SUBSCRIPTION_SUMMARY.to_string(),
        }
    }
}

/// Handler for the billing detail read.
pub struct GetBillingDetailHandler {
    store: Arc<dyn BillingStore>,
    directory: Option<Arc<dyn UserDirectory>>,
}

impl GetBillingDetailHandler {
    pub fn new(store: Arc<dyn BillingStore>, directory: Option<Arc<dyn UserDirectory>>) -> Self {
        Self { store, directory }
    }

    pub async fn handle(
        &self,
        query: GetBillingDetailQuery,
    ) -> Result<BillingDetailView, BillingError> {
        let target = parse_target_user(&query.target_user)?;
        let directory = self.directory.as_deref();
        authorize(directory, &target, &query.requesting_user).await?;

        let detail = latest_subscription(self.store.as_ref(), directory, &target)
            .await?
            .map(|sub| BillingDetailView::from(&sub))
            .unwrap_or_else(BillingDetailView::none);
        Ok(detail)
    }
}
