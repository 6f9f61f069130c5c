//! Billing handlers - webhook reconciliation and the read façade.

mod access;
mod get_billing_detail;
mod get_billing_events;
mod get_subscription_status;
mod process_webhook;

pub use access::{authorize, parse_target_user};
pub use get_billing_detail::{BillingDetailView, GetBillingDetailHandler, GetBillingDetailQuery};
pub use get_billing_events::{BillingEventView, GetBillingEventsHandler, GetBillingEventsQuery};
pub use get_subscription_status::{
    GetSubscriptionStatusHandler, GetSubscriptionStatusQuery, SubscriptionStatusView,
};
pub use process_webhook::{ProcessWebhookCommand, ProcessWebhookResult, ReconciliationEngine};
