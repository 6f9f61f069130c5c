//! Audit sink that emits entries as structured tracing events.

use async_trait::async_trait;

use crate::domain::foundation::DomainError;
use crate::ports::{AuditEntry, AuditSink};

/// Writes each entry under the `bms_billing::audit` target so a log
/// pipeline can route it separately.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn log(&self, entry: AuditEntry) -> Result<(), DomainError> {
        let subscription_id = entry.subscription_id.map(|id| id.to_string());
        let user_id = entry.user_id.as_ref().map(|id| id.to_string());
        tracing::info!(
            target: "bms_billing::audit",
            action = %entry.action,
            actor = ?entry.actor,
            target_id = %entry.target,
            provider = %entry.provider,
            subscription_id = subscription_id.as_deref().unwrap_or(""),
            user_id = user_id.as_deref().unwrap_or(""),
            billing_event_recorded = entry.billing_event_recorded,
            error = entry.error.as_deref().unwrap_or(""),
            raw_payload = entry.raw_payload.as_deref().unwrap_or(""),
            recorded_at = %entry.recorded_at.to_rfc3339(),
            "billing webhook audited"
        );
        Ok(())
    }
}
