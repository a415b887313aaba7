use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::models::{AuditAction, AuditEntry};

/// Destination of audit entries.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: AuditEntry) -> Result<()>;
}

/// Emits each entry as a structured event on the `audit` target.
#[derive(Debug, Clone, Default)]
pub struct LogAuditSink;

#[async_trait]
impl AuditSink for LogAuditSink {
    async fn record(&self, entry: AuditEntry) -> Result<()> {
        info!(
            target: "audit",
            event_id = %entry.event_id,
            user_id = ?entry.user_id,
            entity_type = %entry.entity_type,
            entity_id = ?entry.entity_id,
            "AUDIT: {}", entry.action
        );
        Ok(())
    }
}

/// Keeps entries in memory; handy for local runs and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryAuditSink {
    entries: Arc<RwLock<Vec<AuditEntry>>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries(&self) -> Vec<AuditEntry> {
        self.entries.read().await.clone()
    }

    pub async fn entries_for_user(&self, user_id: &str) -> Vec<AuditEntry> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|entry| entry.user_id.as_deref() == Some(user_id))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, entry: AuditEntry) -> Result<()> {
        self.entries.write().await.push(entry);
        Ok(())
    }
}

/// Front door for the HTTP layer. Recording never fails the caller.
#[derive(Clone)]
pub struct AuditService {
    sink: Arc<dyn AuditSink>,
}

impl AuditService {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    pub async fn log_action(
        &self,
        user_id: Option<&str>,
        action: AuditAction,
        entity_type: &str,
        entity_id: Option<&str>,
    ) {
        let mut entry = AuditEntry::new(action, entity_type);
        if let Some(user_id) = user_id {
            entry = entry.with_user(user_id);
        }
        if let Some(entity_id) = entity_id {
            entry = entry.with_entity(entity_id);
        }

        if let Err(e) = self.sink.record(entry).await {
            warn!("Failed to record audit entry {} {}: {}", action, entity_type, e);
        }
    }
}

impl Default for AuditService {
    fn default() -> Self {
        Self::new(Arc::new(LogAuditSink))
    }
}
