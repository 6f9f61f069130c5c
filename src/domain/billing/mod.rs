//! Billing domain module.
//!
//! Vendor-agnostic webhook events, the Subscription and BillingEvent
//! aggregates, the error taxonomy and the pure helpers (signatures,
//! pagination, summaries) the adapters and handlers share.

mod billing_event;
mod errors;
mod event;
mod pagination;
pub mod signature;
mod status;
mod subscription;
mod summary;

pub use billing_event::{describe_event, BillingEvent};
pub use errors::BillingError;
pub use event::{
    currency_exponent, non_empty, normalize_currency, EventType, NormalizedEvent, PaymentType,
};
pub use pagination::{Page, PageRequest, SortOrder, DEFAULT_PER_PAGE, MAX_PER_PAGE};
pub use status::SubscriptionStatus;
pub use subscription::{normalize_email, Subscription};
pub use summary::{billing_summary, format_amount};
