//! Domain layer - Pure business logic with no infrastructure dependencies.
//!
//! - `foundation` - identifiers, timestamps, auth and error primitives
//! - `billing` - webhook events, subscriptions and billing history

pub mod billing;
pub mod foundation;
