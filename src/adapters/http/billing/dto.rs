//! HTTP DTOs for the billing endpoints.

use serde::{Deserialize, Serialize};

use crate::application::handlers::billing::BillingEventView;
use crate::domain::billing::{BillingError, Page};

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Query string of `GET /billings/users/{userId}/events`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BillingEventsParams {
    /// `created_at_desc` (default), `created_at_asc`, `updated_at_desc`, `updated_at_asc`.
    #[serde(default)]
    pub order: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
    /// Clamped to 1..=100.
    #[serde(default)]
    pub per_page: Option<u32>,
    /// Include the pagination envelope.
    #[serde(default)]
    pub meta: bool,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Pagination envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    pub total: u64,
    pub total_pages: u32,
    pub page: u32,
    pub per_page: u32,
}

/// Billing history page. `meta` fields are flattened in when requested.
#[derive(Debug, Clone, Serialize)]
pub struct BillingEventsResponse {
    pub items: Vec<BillingEventView>,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub meta: Option<PageMeta>,
}

impl BillingEventsResponse {
    pub fn from_page(page: Page<BillingEventView>, with_meta: bool) -> Self {
        let meta = with_meta.then(|| PageMeta {
            total: page.total,
            total_pages: page.total_pages,
            page: page.page,
            per_page: page.per_page,
        });
        Self {
            items: page.items,
            meta,
        }
    }
}

/// Error body shared by every billing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub title: String,
    pub message: String,
}

impl From<&BillingError> for ErrorResponse {
    fn from(err: &BillingError) -> Self {
        Self {
            code: err.code().to_string(),
            title: err.title().to_string(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::PageRequest;

    #[test]
    fn meta_is_flattened_only_when_requested() {
        let page = Page::new(Vec::new(), 0, &PageRequest::default());

        let with = serde_json::to_value(BillingEventsResponse::from_page(page.clone(), true)).unwrap();
        assert_eq!(with["per_page"], 25);
        assert_eq!(with["total"], 0);

        let without = serde_json::to_value(BillingEventsResponse::from_page(page, false)).unwrap();
        assert!(without.get("total").is_none());
        assert_eq!(without["items"], serde_json::json!([]));
    }

    #[test]
    fn error_body_carries_code_and_title() {
        let body = ErrorResponse::from(&BillingError::WebhookTimestampTooOld);
        assert_eq!(body.code, "WEBHOOK_TIMESTAMP_TOO_OLD");
        assert_eq!(body.title, "Webhook verification failed");
    }
}
