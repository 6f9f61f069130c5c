//! Stripe payment provider adapter.
//!
//! # Security
//!
//! - Webhook signatures use HMAC-SHA256 over `"<t>.<body>"` with
//!   constant-time comparison
//! - Signed timestamps older than five minutes are rejected
//! - Secrets are held in `secrecy::SecretString`
//!
//! # Enrichment
//!
//! Subscription webhooks reference customers and products by id. The
//! adapter fetches `/v1/customers/{id}` for the email and
//! `/v1/products/{id}` for the plan name; `/v1/plans/{id}` is read for
//! metadata when present.

mod stripe_adapter;
mod webhook_types;

pub use stripe_adapter::{
    map_event_type, StripeProvider, DEFAULT_API_BASE_URL, MAX_TIMESTAMP_AGE_SECS,
    SIGNATURE_HEADER,
};
pub use webhook_types::{SignatureHeader, StripeEvent, StripeInvoice, StripeSubscription};
