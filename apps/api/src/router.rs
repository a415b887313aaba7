use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};
use tracing::info;

use appointment_cell::router::appointment_routes;
use appointment_cell::{AppointmentStore, InMemoryAppointmentStore, SchedulingEngine, SupabaseAppointmentStore};
use availability_cell::router::availability_routes;
use availability_cell::{AvailabilityService, AvailabilityStore, InMemoryAvailabilityStore, SupabaseAvailabilityStore};
use notification_cell::{LogNotificationSink, NotificationSink, SupabaseNotificationSink};
use security_cell::AuditService;
use shared_config::{AppConfig, StorageBackend};

/// Everything the routers need, wired from configuration.
pub struct AppServices {
    pub availability: Arc<AvailabilityService>,
    pub engine: Arc<SchedulingEngine>,
    pub audit: AuditService,
}

impl AppServices {
    pub fn from_config(config: &AppConfig) -> Self {
        let (slots, appointments): (Arc<dyn AvailabilityStore>, Arc<dyn AppointmentStore>) =
            match config.storage_backend {
                StorageBackend::Supabase => (
                    Arc::new(SupabaseAvailabilityStore::new(config)),
                    Arc::new(SupabaseAppointmentStore::new(config)),
                ),
                StorageBackend::Memory => (
                    Arc::new(InMemoryAvailabilityStore::new()),
                    Arc::new(InMemoryAppointmentStore::new()),
                ),
            };

        let notifications: Arc<dyn NotificationSink> =
            if config.notifications_enabled && config.is_supabase_configured() {
                Arc::new(SupabaseNotificationSink::new(config))
            } else {
                info!("Notifications are written to the log only");
                Arc::new(LogNotificationSink)
            };

        Self {
            availability: Arc::new(AvailabilityService::new(slots.clone())),
            engine: Arc::new(SchedulingEngine::new(slots, appointments, notifications)),
            audit: AuditService::default(),
        }
    }
}

pub fn create_router(config: Arc<AppConfig>, services: AppServices) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic scheduling API is running!" }))
        .nest(
            "/appointments",
            appointment_routes(config.clone(), services.engine, services.audit),
        )
        .nest(
            "/availability",
            availability_routes(config, services.availability),
        )
}
