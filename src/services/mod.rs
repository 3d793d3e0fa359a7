pub mod booking;

pub use booking::{BookingCoordinator, BookingError, BookingRequest};
