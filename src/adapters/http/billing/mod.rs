//! HTTP adapter for billing endpoints.
//!
//! - `POST /api/v1/bms/billings/{providerName}/webhooks` - Provider webhooks
//! - `GET /api/v1/bms/billings/users/{userId}/events` - Billing history
//! - `GET /api/v1/bms/users/{userId}/details/subscription` - Subscription status
//! - `GET /api/v1/bms/users/{userId}/details/billing` - Billing detail

pub mod dto;
pub mod handlers;
pub mod routes;

pub use handlers::{BillingApiError, BillingAppState};
pub use routes::{billing_router, billing_routes, API_PREFIX};
