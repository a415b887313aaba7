pub mod models;
pub mod services;

pub use models::{Notification, NotificationType};
pub use services::log::LogNotificationSink;
pub use services::sink::NotificationSink;
pub use services::supabase::SupabaseNotificationSink;
