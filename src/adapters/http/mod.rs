//! HTTP adapters - REST API implementations.

pub mod billing;
pub mod middleware;

// Re-export key types for convenience
pub use billing::{billing_router, BillingAppState};
