//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `stripe`, `lemonsqueezy`, `kofi` - Payment provider webhooks
//! - `providers` - Provider registry and the mock provider
//! - `postgres` - PostgreSQL billing store
//! - `memory` - In-memory billing store and user directory
//! - `http` - Axum routes and middleware
//! - `auth` - Bearer token validation

pub mod audit;
pub mod auth;
pub mod clock;
pub mod http;
pub mod http_client;
pub mod kofi;
pub mod lemonsqueezy;
pub mod memory;
pub mod postgres;
pub mod providers;
pub mod stripe;

pub use audit::{InMemoryAuditSink, TracingAuditSink};
pub use auth::{JwtSessionValidator, MockSessionValidator};
pub use clock::{FixedClock, SystemClock};
pub use http_client::{MockHttpClient, ReqwestProviderClient};
pub use memory::{InMemoryBillingStore, InMemoryUserDirectory};
pub use postgres::PostgresBillingStore;
pub use providers::{MockProvider, ProviderRegistry};
