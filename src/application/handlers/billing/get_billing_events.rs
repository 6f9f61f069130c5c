//! GetBillingEventsHandler - Query handler for a user's billing history.

use std::sync::Arc;

use serde::Serialize;

use super::access::{authorize, parse_target_user};
use crate::domain::billing::{BillingError, BillingEvent, Page, PageRequest, SortOrder};
use crate::domain::foundation::{Timestamp, UserId};
use crate::ports::{BillingEventFilter, BillingStore, UserDirectory};

/// Query for one page of `target_user`'s billing events.
#[derive(Debug, Clone)]
pub struct GetBillingEventsQuery {
    pub target_user: String,
    pub requesting_user: UserId,
    pub page: PageRequest,
    pub order: SortOrder,
}

/// Compact billing event for history views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BillingEventView {
    pub id: String,
    pub event_type: String,
    pub payment_type: String,
    pub provider: String,
    pub provider_subscription_id: Option<String>,
    pub status: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub plan_name: Option<String>,
    pub description: String,
    pub receipt_url: Option<String>,
    pub occurred_at: Timestamp,
    pub created_at: Timestamp,
}

impl From<BillingEvent> for BillingEventView {
    fn from(event: BillingEvent) -> Self {
        Self {
            id: event.id.to_string(),
            description: event.description(),
            event_type: event.event_type.as_str().to_string(),
            payment_type: event.payment_type.as_str().to_string(),
            provider: event.integrator,
            provider_subscription_id: event.integrator_subscription_id,
            status: event.status.map(|s| s.as_str().to_string()),
            amount: event.amount,
            currency: event.currency,
            plan_name: event.plan_name,
            receipt_url: event.receipt_url,
            occurred_at: event.provider_event_time,
            created_at: event.created_at,
        }
    }
}

/// Handler for the billing history read.
pub struct GetBillingEventsHandler {
    store: Arc<dyn BillingStore>,
    directory: Option<Arc<dyn UserDirectory>>,
}

impl GetBillingEventsHandler {
    pub fn new(store: Arc<dyn BillingStore>, directory: Option<Arc<dyn UserDirectory>>) -> Self {
        Self { store, directory }
    }

    pub async fn handle(
        &self,
        query: GetBillingEventsQuery,
    ) -> Result<Page<BillingEventView>, BillingError> {
        let target = parse_target_user(&query.target_user)?;
        authorize(self.directory.as_deref(), &target, &query.requesting_user).await?;

        let page = self
            .store
            .get_billing_events(&BillingEventFilter::for_user(target), &query.page, query.order)
            .await?;
        Ok(page.map(BillingEventView::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryBillingStore;
    use crate::domain::billing::{EventType, NormalizedEvent};
    use crate::domain::foundation::BillingEventId;

    fn uid(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    async fn seed(store: &InMemoryBillingStore, count: usize) {
        for i in 0..count {
            let mut event =
                NormalizedEvent::new(EventType::PaymentSucceeded, format!("evt_{}", i), Timestamp::now());
            event.plan_name = Some("Pro".into());
            event.amount = 2999;
            event.currency = "USD".into();
            let record = BillingEvent::from_event(
                BillingEventId::new(),
                "stripe",
                &event,
                None,
                Some(uid("u-1")),
                Timestamp::from_unix_secs(1_700_000_000 + i as i64).unwrap(),
            );
            store.create_billing_event(&record).await.unwrap();
        }
    }

    fn query(page: Option<u32>, per_page: Option<u32>) -> GetBillingEventsQuery {
        GetBillingEventsQuery {
            target_user: "u-1".into(),
            requesting_user: uid("u-1"),
            page: PageRequest::new(page, per_page),
            order: SortOrder::CreatedAtDesc,
        }
    }

    #[tokio::test]
    async fn pages_newest_first_with_descriptions() {
        let store = InMemoryBillingStore::new();
        seed(&store, 3).await;
        let handler = GetBillingEventsHandler::new(Arc::new(store), None);

        let page = handler.handle(query(Some(1), Some(2))).await.unwrap();

        assert_eq!(page.total, 3);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].description, "Payment for Pro");
        assert!(page.items[0].created_at > page.items[1].created_at);
    }

    #[tokio::test]
    async fn page_past_the_end_fails() {
        let store = InMemoryBillingStore::new();
        seed(&store, 3).await;
        let handler = GetBillingEventsHandler::new(Arc::new(store), None);

        let err = handler.handle(query(Some(3), Some(2))).await.unwrap_err();
        assert_eq!(err, BillingError::PageOutOfRange { page: 3, total_pages: 2 });
    }

    #[tokio::test]
    async fn empty_history_is_an_empty_page() {
        let handler = GetBillingEventsHandler::new(Arc::new(InMemoryBillingStore::new()), None);
        let page = handler.handle(query(None, None)).await.unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.per_page, 25);
    }
}
