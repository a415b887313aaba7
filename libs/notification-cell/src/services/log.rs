use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::models::Notification;
use crate::services::sink::NotificationSink;

/// Writes notifications to the log only. Used when nothing persists them.
#[derive(Debug, Clone, Default)]
pub struct LogNotificationSink;

#[async_trait]
impl NotificationSink for LogNotificationSink {
    async fn send(&self, notification: &Notification) -> Result<()> {
        info!(
            target: "notifications",
            user_id = %notification.user_id,
            notification_type = %notification.notification_type,
            title = %notification.title,
            "{}", notification.message
        );
        Ok(())
    }
}
