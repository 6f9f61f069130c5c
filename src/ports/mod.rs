//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Ingestion Ports
//!
//! - `PaymentProvider` - per-vendor webhook verification and parsing
//! - `ProviderHttpClient` - authenticated GETs for payload enrichment
//! - `Clock` - injectable time source
//!
//! ## Storage and Collaborator Ports
//!
//! - `BillingStore` - subscriptions and billing events with uniqueness guarantees
//! - `UserDirectory` - user lookup by id or email
//! - `AuditSink` - write-only audit trail
//! - `SessionValidator` - bearer token validation for read endpoints

mod audit_sink;
mod billing_store;
mod clock;
mod http_client;
mod payment_provider;
mod session_validator;
mod user_directory;

pub use audit_sink::{AuditActor, AuditEntry, AuditSink};
pub use billing_store::{BillingEventFilter, BillingStore, SubscriptionFilter};
pub use clock::Clock;
pub use http_client::ProviderHttpClient;
pub use payment_provider::{PaymentProvider, SubscriptionInfo, WebhookRequest};
pub use session_validator::SessionValidator;
pub use user_directory::{DirectoryUser, UserDirectory};
