//! HTTP handlers for the billing endpoints.
//!
//! These handlers connect Axum routes to the reconciliation engine and the
//! read handlers.

use std::str::FromStr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Json, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::adapters::http::middleware::RequireAuth;
use crate::application::handlers::billing::{
    BillingDetailView, GetBillingDetailHandler, GetBillingDetailQuery, GetBillingEventsHandler,
    GetBillingEventsQuery, GetSubscriptionStatusHandler, GetSubscriptionStatusQuery,
    ProcessWebhookCommand, ReconciliationEngine, SubscriptionStatusView,
};
use crate::domain::billing::{BillingError, PageRequest, SortOrder};
use crate::ports::{BillingStore, UserDirectory, WebhookRequest};

use super::dto::{BillingEventsParams, BillingEventsResponse, ErrorResponse};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared state for the billing routes.
#[derive(Clone)]
pub struct BillingAppState {
    pub engine: Arc<ReconciliationEngine>,
    pub store: Arc<dyn BillingStore>,
    pub directory: Option<Arc<dyn UserDirectory>>,
}

impl BillingAppState {
    pub fn subscription_status_handler(&self) -> GetSubscriptionStatusHandler {
        GetSubscriptionStatusHandler::new(self.store.clone(), self.directory.clone())
    }

    pub fn billing_events_handler(&self) -> GetBillingEventsHandler {
        GetBillingEventsHandler::new(self.store.clone(), self.directory.clone())
    }

    pub fn billing_detail_handler(&self) -> GetBillingDetailHandler {
        GetBillingDetailHandler::new(self.store.clone(), self.directory.clone())
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Webhooks
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/v1/bms/billings/{providerName}/webhooks
///
/// Providers authenticate by signature, so no bearer token is required.
/// Success is an empty 200, including redeliveries of a recorded event.
pub async fn receive_webhook(
    State(state): State<BillingAppState>,
    Path(provider_name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, BillingApiError> {
    let cmd = ProcessWebhookCommand {
        provider_name,
        request: WebhookRequest::new(headers, body.to_vec()),
    };
    state.engine.handle(cmd).await?;
    Ok(StatusCode::OK)
}

// ════════════════════════════════════════════════════════════════════════════════
// Reads
// ════════════════════════════════════════════════════════════════════════════════

/// GET /api/v1/bms/billings/users/{userId}/events
pub async fn get_billing_events(
    State(state): State<BillingAppState>,
    RequireAuth(user): RequireAuth,
    Path(user_id): Path<String>,
    Query(params): Query<BillingEventsParams>,
) -> Result<Json<BillingEventsResponse>, BillingApiError> {
    let order = match params.order.as_deref() {
        Some(raw) => SortOrder::from_str(raw)
            .map_err(|_| BillingError::InvalidQuery(format!("order={}", raw)))?,
        None => SortOrder::default(),
    };
    let query = GetBillingEventsQuery {
        target_user: user_id,
        requesting_user: user.id,
        page: PageRequest::new(params.page, params.per_page),
        order,
    };
    let page = state.billing_events_handler().handle(query).await?;
    Ok(Json(BillingEventsResponse::from_page(page, params.meta)))
}

/// GET /api/v1/bms/users/{userId}/details/subscription
pub async fn get_subscription_status(
    State(state): State<BillingAppState>,
    RequireAuth(user): RequireAuth,
    Path(user_id): Path<String>,
) -> Result<Json<SubscriptionStatusView>, BillingApiError> {
    let query = GetSubscriptionStatusQuery {
        target_user: user_id,
        requesting_user: user.id,
    };
    let view = state.subscription_status_handler().handle(query).await?;
    Ok(Json(view))
}

/// GET /api/v1/bms/users/{userId}/details/billing
pub async fn get_billing_detail(
    State(state): State<BillingAppState>,
    RequireAuth(user): RequireAuth,
    Path(user_id): Path<String>,
) -> Result<Json<BillingDetailView>, BillingApiError> {
    let query = GetBillingDetailQuery {
        target_user: user_id,
        requesting_user: user.id,
    };
    let detail = state.billing_detail_handler().handle(query).await?;
    Ok(Json(detail))
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts billing errors to HTTP responses.
#[derive(Debug)]
pub struct BillingApiError(pub BillingError);

impl From<BillingError> for BillingApiError {
    fn from(err: BillingError) -> Self {
        Self(err)
    }
}

impl IntoResponse for BillingApiError {
    fn into_response(self) -> Response {
        let status = self.0.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.0.code(), error = %self.0, "Billing request failed");
        } else {
            tracing::debug!(code = self.0.code(), error = %self.0, "Billing request rejected");
        }
        (status, Json(ErrorResponse::from(&self.0))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_uses_taxonomy_status() {
        let response = BillingApiError(BillingError::InvalidSignature).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = BillingApiError(BillingError::Forbidden).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = BillingApiError(BillingError::Upstream("boom".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
