pub mod bookings;
pub mod notify;
pub mod rate_limit;
pub mod reschedule;
pub mod slots;
pub mod status_machine;
pub mod workflow;
