use async_trait::async_trait;
use std::error::Error;
use uuid::Uuid;

use crate::booking::Booking;
use crate::review::{NewReview, Review, ReviewUpdate};
use crate::ride::{NewRide, Ride, RideUpdate};

/// CRUD surface for rides. Seat-count mutations that stem from booking
/// operations do not go through here; they belong to the seat ledger.
#[async_trait]
pub trait RideRepository: Send + Sync {
    async fn create(
        &self,
        driver_id: Uuid,
        ride: NewRide,
    ) -> Result<Ride, Box<dyn Error + Send + Sync>>;

    async fn find(&self, id: Uuid) -> Result<Option<Ride>, Box<dyn Error + Send + Sync>>;

    async fn list(&self) -> Result<Vec<Ride>, Box<dyn Error + Send + Sync>>;

    async fn list_by_driver(
        &self,
        driver_id: Uuid,
    ) -> Result<Vec<Ride>, Box<dyn Error + Send + Sync>>;

    /// Applies a driver edit. When the edit touches `seats_available`,
    /// the implementation must recompute `seats_total` so that active
    /// bookings plus availability still add up.
    async fn update(
        &self,
        id: Uuid,
        patch: RideUpdate,
    ) -> Result<Option<Ride>, Box<dyn Error + Send + Sync>>;

    async fn mark_done(&self, id: Uuid) -> Result<Option<Ride>, Box<dyn Error + Send + Sync>>;

    async fn delete(&self, id: Uuid) -> Result<bool, Box<dyn Error + Send + Sync>>;
}

/// Read side for bookings. All writes go through the seat ledger.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn find(&self, id: Uuid) -> Result<Option<Booking>, Box<dyn Error + Send + Sync>>;

    async fn list_by_passenger(
        &self,
        passenger_id: Uuid,
    ) -> Result<Vec<Booking>, Box<dyn Error + Send + Sync>>;
}

#[async_trait]
pub trait ReviewRepository: Send + Sync {
    async fn create(
        &self,
        author_id: Uuid,
        review: NewReview,
    ) -> Result<Review, Box<dyn Error + Send + Sync>>;

    async fn find(&self, id: Uuid) -> Result<Option<Review>, Box<dyn Error + Send + Sync>>;

    async fn list_by_ride(
        &self,
        ride_id: Uuid,
    ) -> Result<Vec<Review>, Box<dyn Error + Send + Sync>>;

    async fn list_by_author(
        &self,
        author_id: Uuid,
    ) -> Result<Vec<Review>, Box<dyn Error + Send + Sync>>;

    async fn update(
        &self,
        id: Uuid,
        patch: ReviewUpdate,
    ) -> Result<Option<Review>, Box<dyn Error + Send + Sync>>;

    async fn delete(&self, id: Uuid) -> Result<bool, Box<dyn Error + Send + Sync>>;
}
