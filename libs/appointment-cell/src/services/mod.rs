pub mod memory;
pub mod reschedule;
pub mod scheduling;
pub mod store;
pub mod supabase;
