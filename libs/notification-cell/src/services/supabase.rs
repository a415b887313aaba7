use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::Notification;
use crate::services::sink::NotificationSink;

/// Stores notifications as rows of the `notifications` table for the
/// delivery side to pick up.
pub struct SupabaseNotificationSink {
    supabase: SupabaseClient,
}

impl SupabaseNotificationSink {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }
}

#[async_trait]
impl NotificationSink for SupabaseNotificationSink {
    async fn send(&self, notification: &Notification) -> Result<()> {
        debug!("Storing {} notification for user {}", notification.notification_type, notification.user_id);

        let _: Value = self
            .supabase
            .request(
                Method::POST,
                "/rest/v1/notifications",
                Some(self.supabase.service_token()),
                Some(json!({
                    "user_id": notification.user_id,
                    "title": notification.title,
                    "message": notification.message,
                    "type": notification.notification_type,
                    "read": false,
                    "created_at": Utc::now().to_rfc3339(),
                })),
            )
            .await?;

        Ok(())
    }
}
