//! Recording audit sink for tests.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::{AuditEntry, AuditSink};

/// Keeps every entry in memory; can be told to fail.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAuditSink {
    entries: Arc<RwLock<Vec<AuditEntry>>>,
    fail: bool,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose `log` always errors.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub async fn entries(&self) -> Vec<AuditEntry> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn log(&self, entry: AuditEntry) -> Result<(), DomainError> {
        if self.fail {
            return Err(DomainError::new(ErrorCode::InternalError, "audit sink unavailable"));
        }
        self.entries.write().await.push(entry);
        Ok(())
    }
}
