pub mod booking;
pub mod lifecycle;
pub mod store;

pub use booking::BookingScheduler;
pub use lifecycle::AppointmentLifecycle;
pub use store::{AppointmentStore, InMemoryAppointmentStore, SupabaseAppointmentStore};
