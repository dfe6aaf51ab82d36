//! Repositories: data access for each table.

pub mod applications;
pub mod bookings;
pub mod processor_events;
pub mod repository;
pub mod shifts;
pub mod users;

pub use applications::Applications;
pub use bookings::Bookings;
pub use processor_events::ProcessorEvents;
pub use repository::Repository;
pub use shifts::Shifts;
pub use users::Users;
