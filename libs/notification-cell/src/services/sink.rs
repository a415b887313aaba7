use anyhow::Result;
use async_trait::async_trait;

use crate::models::Notification;

/// Receives appointment lifecycle notices. Callers treat delivery as
/// fire-and-forget and must not fail on an `Err`.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<()>;
}
