pub mod handlers;
pub mod router;
pub mod models;
pub mod services;

pub use models::*;
pub use services::availability::AvailabilityService;
pub use services::memory::InMemoryAvailabilityStore;
pub use services::store::AvailabilityStore;
pub use services::supabase::SupabaseAvailabilityStore;
