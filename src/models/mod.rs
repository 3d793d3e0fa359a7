pub mod booking;
pub mod event;
pub mod seat;
pub mod timestamp;

pub use booking::{Booking, BookingStatus};
pub use event::CatalogEvent;
pub use seat::{EventSeat, SeatStatus};
pub use timestamp::FlexTimestamp;
