pub mod booking;
pub mod history;
pub mod reschedule;
pub mod time_slot;

pub use booking::{Booking, BookingStatus, NewBooking, PaymentStatus};
pub use history::{NewHistoryEntry, StatusHistoryEntry};
pub use reschedule::{RescheduleOutcome, RescheduleRequest, RescheduleStatus};
pub use time_slot::{SlotAvailability, SlotBookingStatus, TimeRange, TimeSlot};
