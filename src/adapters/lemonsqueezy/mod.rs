//! Lemon Squeezy payment provider adapter.
//!
//! Webhooks are signed with a hex HMAC-SHA256 of the raw body in
//! `X-Signature`. There is no signed timestamp, so replays are only caught
//! by billing event idempotency.
//!
//! Subscription amounts come from the price object (tiered schemes are
//! computed locally, see [`pricing`]) or, failing that, the order item.

mod lemonsqueezy_adapter;
pub mod pricing;
mod webhook_types;

pub use lemonsqueezy_adapter::{
    map_event_type, LemonSqueezyProvider, DEFAULT_API_BASE_URL, DEFAULT_CURRENCY,
    SIGNATURE_HEADER,
};
pub use webhook_types::{LsId, LsSubscription, LsWebhook};
