//! Application layer - Commands, Queries, and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! The webhook command runs the reconciliation engine; the queries back the
//! read endpoints.

pub mod handlers;

pub use handlers::billing::{
    BillingDetailView, BillingEventView, GetBillingDetailHandler, GetBillingDetailQuery,
    GetBillingEventsHandler, GetBillingEventsQuery, GetSubscriptionStatusHandler,
    GetSubscriptionStatusQuery, ProcessWebhookCommand, ProcessWebhookResult,
    ReconciliationEngine, SubscriptionStatusView,
};
