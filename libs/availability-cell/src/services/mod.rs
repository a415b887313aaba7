pub mod availability;
pub mod memory;
pub mod store;
pub mod supabase;
