//! Audit sink port.
//!
//! Receives one entry per processed webhook. Failures are reported back to
//! the caller, which logs them and carries on.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{DomainError, SubscriptionId, Timestamp, UserId};

/// Who performed an audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditActor {
    System,
    User,
    Admin,
}

/// Record of one webhook's outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Normalized event type.
    pub action: String,
    pub actor: AuditActor,
    /// Provider event id.
    pub target: String,
    pub provider: String,
    pub subscription_id: Option<SubscriptionId>,
    pub user_id: Option<UserId>,
    /// Whether the BillingEvent write succeeded (or was a duplicate).
    pub billing_event_recorded: bool,
    /// Only present when the BillingEvent write failed.
    pub raw_payload: Option<String>,
    pub error: Option<String>,
    pub recorded_at: Timestamp,
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn log(&self, entry: AuditEntry) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actor_serializes_upper_case() {
        assert_eq!(serde_json::to_string(&AuditActor::System).unwrap(), "\"SYSTEM\"");
    }

    #[test]
    fn audit_sink_is_object_safe() {
        fn _accepts_dyn(_sink: &dyn AuditSink) {}
    }
}
