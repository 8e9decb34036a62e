pub mod availability;
pub mod interval_set;
pub mod store;

pub use availability::{AvailabilityChecker, SlotRegistry};
pub use interval_set::IntervalSet;
pub use store::{AvailabilityStore, InMemoryAvailabilityStore, SupabaseAvailabilityStore};
