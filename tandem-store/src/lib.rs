pub mod app_config;
pub mod booking_repo;
pub mod database;
pub mod redis_repo;
pub mod review_repo;
pub mod ride_repo;

pub use booking_repo::{PgBookingRepository, PgSeatLedger};
pub use database::DbClient;
pub use redis_repo::RedisClient;
pub use review_repo::PgReviewRepository;
pub use ride_repo::PgRideRepository;
