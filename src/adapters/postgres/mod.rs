//! PostgreSQL adapters - Database implementations for storage ports.
//!
//! - `PostgresBillingStore` - subscriptions and billing events

mod billing_store;

pub use billing_store::PostgresBillingStore;
