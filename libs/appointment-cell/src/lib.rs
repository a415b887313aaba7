pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::*;
pub use services::memory::InMemoryAppointmentStore;
pub use services::reschedule::RescheduleTarget;
pub use services::scheduling::SchedulingEngine;
pub use services::store::AppointmentStore;
pub use services::supabase::SupabaseAppointmentStore;
