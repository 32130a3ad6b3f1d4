pub mod booking;
pub mod repository;
pub mod review;
pub mod ride;

pub use booking::{Booking, BookingStatus};
pub use review::Review;
pub use ride::Ride;
