// =====================================================================================
// SECURITY CELL - AUDIT TRAIL OF SCHEDULING MUTATIONS
// =====================================================================================

pub mod models;
pub mod services;

pub use models::{AuditAction, AuditEntry};
pub use services::audit::{AuditService, AuditSink, LogAuditSink, MemoryAuditSink};
