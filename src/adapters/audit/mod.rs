//! Audit sink adapters.

mod in_memory_audit_sink;
mod tracing_audit_sink;

pub use in_memory_audit_sink::InMemoryAuditSink;
pub use tracing_audit_sink::TracingAuditSink;
