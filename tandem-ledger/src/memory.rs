use std::collections::HashMap;
use std::error::Error;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use tandem_domain::repository::{BookingRepository, ReviewRepository, RideRepository};
use tandem_domain::review::{NewReview, Review, ReviewUpdate};
use tandem_domain::ride::{NewRide, Ride, RideUpdate};
use tandem_domain::{Booking, BookingStatus};

use crate::ledger::{validate_new_booking, validate_seat_change, LedgerError, SeatLedger};

#[derive(Default)]
struct State {
    rides: HashMap<Uuid, Ride>,
    bookings: HashMap<Uuid, Booking>,
    reviews: HashMap<Uuid, Review>,
}

/// In-memory ledger and stores. One mutex guards all state, so every
/// operation is a serialized read-modify-write, the same guarantee the
/// Postgres implementation gets from row locks.
#[derive(Default)]
pub struct MemoryLedger {
    state: Mutex<State>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SeatLedger for MemoryLedger {
    async fn create_booking(
        &self,
        ride_id: Uuid,
        passenger_id: Uuid,
        seats_requested: i64,
        pickup_location: Option<String>,
    ) -> Result<Booking, LedgerError> {
        let mut state = self.state.lock().await;
        let ride = state
            .rides
            .get_mut(&ride_id)
            .ok_or(LedgerError::RideNotFound(ride_id))?;
        let now = Utc::now();
        let seats = validate_new_booking(ride, seats_requested, now)?;

        ride.seats_available -= seats;
        ride.updated_at = now;

        let booking = Booking {
            id: Uuid::new_v4(),
            ride_id,
            passenger_id,
            seats_booked: seats,
            pickup_location,
            status: BookingStatus::Active,
            created_at: now,
            updated_at: now,
        };
        state.bookings.insert(booking.id, booking.clone());
        tracing::debug!(%ride_id, seats, "booking created");
        Ok(booking)
    }

    async fn change_booking_seats(
        &self,
        booking_id: Uuid,
        new_seat_count: i64,
    ) -> Result<Booking, LedgerError> {
        let mut state = self.state.lock().await;
        let booking = state
            .bookings
            .get(&booking_id)
            .filter(|b| b.is_active())
            .cloned()
            .ok_or(LedgerError::BookingNotFound(booking_id))?;
        let ride = state
            .rides
            .get_mut(&booking.ride_id)
            .ok_or(LedgerError::RideNotFound(booking.ride_id))?;
        let now = Utc::now();
        let (seats, delta) = validate_seat_change(ride, &booking, new_seat_count)?;

        ride.seats_available -= delta;
        ride.updated_at = now;

        let stored = state
            .bookings
            .get_mut(&booking_id)
            .ok_or_else(|| LedgerError::Storage("booking vanished mid-operation".into()))?;
        stored.seats_booked = seats;
        stored.updated_at = now;
        tracing::debug!(%booking_id, seats, delta, "booking resized");
        Ok(stored.clone())
    }

    async fn cancel_booking(&self, booking_id: Uuid) -> Result<Booking, LedgerError> {
        let mut state = self.state.lock().await;
        let booking = state
            .bookings
            .get(&booking_id)
            .filter(|b| b.is_active())
            .cloned()
            .ok_or(LedgerError::BookingNotFound(booking_id))?;
        let ride = state
            .rides
            .get_mut(&booking.ride_id)
            .ok_or(LedgerError::RideNotFound(booking.ride_id))?;
        let now = Utc::now();

        let restored = ride.seats_available + booking.seats_booked;
        if restored > ride.seats_total {
            // Releasing these seats would put the ride above capacity;
            // the ledger state is corrupt, refuse to make it worse.
            return Err(LedgerError::Storage(format!(
                "canceling {} would leave {} of {} seats",
                booking_id, restored, ride.seats_total
            )));
        }
        ride.seats_available = restored;
        ride.updated_at = now;

        let stored = state
            .bookings
            .get_mut(&booking_id)
            .ok_or_else(|| LedgerError::Storage("booking vanished mid-operation".into()))?;
        stored.status = BookingStatus::Canceled;
        stored.updated_at = now;
        tracing::debug!(%booking_id, released = booking.seats_booked, "booking canceled");
        Ok(stored.clone())
    }
}

#[async_trait]
impl RideRepository for MemoryLedger {
    async fn create(
        &self,
        driver_id: Uuid,
        ride: NewRide,
    ) -> Result<Ride, Box<dyn Error + Send + Sync>> {
        let now = Utc::now();
        let ride = Ride {
            id: Uuid::new_v4(),
            driver_id,
            origin: ride.origin,
            destination: ride.destination,
            departure_at: ride.departure_at,
            seats_total: ride.seats_available,
            seats_available: ride.seats_available,
            price_per_seat: ride.price_per_seat,
            notes: ride.notes,
            is_done: false,
            created_at: now,
            updated_at: now,
        };
        let mut state = self.state.lock().await;
        state.rides.insert(ride.id, ride.clone());
        Ok(ride)
    }

    async fn find(&self, id: Uuid) -> Result<Option<Ride>, Box<dyn Error + Send + Sync>> {
        Ok(self.state.lock().await.rides.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<Ride>, Box<dyn Error + Send + Sync>> {
        let state = self.state.lock().await;
        let mut rides: Vec<Ride> = state.rides.values().cloned().collect();
        rides.sort_by_key(|r| r.departure_at);
        Ok(rides)
    }

    async fn list_by_driver(
        &self,
        driver_id: Uuid,
    ) -> Result<Vec<Ride>, Box<dyn Error + Send + Sync>> {
        let state = self.state.lock().await;
        let mut rides: Vec<Ride> = state
            .rides
            .values()
            .filter(|r| r.driver_id == driver_id)
            .cloned()
            .collect();
        rides.sort_by_key(|r| r.departure_at);
        Ok(rides)
    }

    async fn update(
        &self,
        id: Uuid,
        patch: RideUpdate,
    ) -> Result<Option<Ride>, Box<dyn Error + Send + Sync>> {
        let mut state = self.state.lock().await;
        let Some(current) = state.rides.get(&id).cloned() else {
            return Ok(None);
        };
        let booked: i32 = state
            .bookings
            .values()
            .filter(|b| b.ride_id == id && b.is_active())
            .map(|b| b.seats_booked)
            .sum();

        let mut ride = current;
        if let Some(origin) = patch.origin {
            ride.origin = origin;
        }
        if let Some(destination) = patch.destination {
            ride.destination = destination;
        }
        if let Some(departure_at) = patch.departure_at {
            ride.departure_at = departure_at;
        }
        if let Some(price) = patch.price_per_seat {
            ride.price_per_seat = price;
        }
        if let Some(notes) = patch.notes {
            ride.notes = Some(notes);
        }
        if let Some(seats) = patch.seats_available {
            // Driver sets what is still on offer; capacity follows so the
            // ledger invariant keeps holding.
            ride.seats_available = seats;
            ride.seats_total = seats + booked;
        }
        ride.updated_at = Utc::now();
        state.rides.insert(id, ride.clone());
        Ok(Some(ride))
    }

    async fn mark_done(&self, id: Uuid) -> Result<Option<Ride>, Box<dyn Error + Send + Sync>> {
        let mut state = self.state.lock().await;
        let Some(ride) = state.rides.get_mut(&id) else {
            return Ok(None);
        };
        ride.is_done = true;
        ride.updated_at = Utc::now();
        Ok(Some(ride.clone()))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, Box<dyn Error + Send + Sync>> {
        let mut state = self.state.lock().await;
        if state.rides.remove(&id).is_none() {
            return Ok(false);
        }
        state.bookings.retain(|_, b| b.ride_id != id);
        state.reviews.retain(|_, r| r.ride_id != id);
        Ok(true)
    }
}

#[async_trait]
impl BookingRepository for MemoryLedger {
    async fn find(&self, id: Uuid) -> Result<Option<Booking>, Box<dyn Error + Send + Sync>> {
        Ok(self.state.lock().await.bookings.get(&id).cloned())
    }

    async fn list_by_passenger(
        &self,
        passenger_id: Uuid,
    ) -> Result<Vec<Booking>, Box<dyn Error + Send + Sync>> {
        let state = self.state.lock().await;
        let mut bookings: Vec<Booking> = state
            .bookings
            .values()
            .filter(|b| b.passenger_id == passenger_id)
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bookings)
    }
}

#[async_trait]
impl ReviewRepository for MemoryLedger {
    async fn create(
        &self,
        author_id: Uuid,
        review: NewReview,
    ) -> Result<Review, Box<dyn Error + Send + Sync>> {
        let review = Review {
            id: Uuid::new_v4(),
            ride_id: review.ride_id,
            author_id,
            rating: review.rating,
            comment: review.comment,
            created_at: Utc::now(),
        };
        let mut state = self.state.lock().await;
        state.reviews.insert(review.id, review.clone());
        Ok(review)
    }

    async fn find(&self, id: Uuid) -> Result<Option<Review>, Box<dyn Error + Send + Sync>> {
        Ok(self.state.lock().await.reviews.get(&id).cloned())
    }

    async fn list_by_ride(
        &self,
        ride_id: Uuid,
    ) -> Result<Vec<Review>, Box<dyn Error + Send + Sync>> {
        let state = self.state.lock().await;
        let mut reviews: Vec<Review> = state
            .reviews
            .values()
            .filter(|r| r.ride_id == ride_id)
            .cloned()
            .collect();
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reviews)
    }

    async fn list_by_author(
        &self,
        author_id: Uuid,
    ) -> Result<Vec<Review>, Box<dyn Error + Send + Sync>> {
        let state = self.state.lock().await;
        let mut reviews: Vec<Review> = state
            .reviews
            .values()
            .filter(|r| r.author_id == author_id)
            .cloned()
            .collect();
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reviews)
    }

    async fn update(
        &self,
        id: Uuid,
        patch: ReviewUpdate,
    ) -> Result<Option<Review>, Box<dyn Error + Send + Sync>> {
        let mut state = self.state.lock().await;
        let Some(review) = state.reviews.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(rating) = patch.rating {
            review.rating = rating;
        }
        if let Some(comment) = patch.comment {
            review.comment = Some(comment);
        }
        Ok(Some(review.clone()))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, Box<dyn Error + Send + Sync>> {
        Ok(self.state.lock().await.reviews.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Arc;

    async fn seed_ride(ledger: &MemoryLedger, seats: i32) -> Ride {
        RideRepository::create(
            ledger,
            Uuid::new_v4(),
            NewRide {
                origin: "Berlin".to_string(),
                destination: "Leipzig".to_string(),
                departure_at: Utc::now() + Duration::hours(3),
                seats_available: seats,
                price_per_seat: 12,
                notes: None,
            },
        )
        .await
        .unwrap()
    }

    async fn ride_state(ledger: &MemoryLedger, id: Uuid) -> Ride {
        RideRepository::find(ledger, id).await.unwrap().unwrap()
    }

    async fn assert_invariant(ledger: &MemoryLedger, ride_id: Uuid) {
        let state = ledger.state.lock().await;
        let ride = &state.rides[&ride_id];
        let booked: i32 = state
            .bookings
            .values()
            .filter(|b| b.ride_id == ride_id && b.is_active())
            .map(|b| b.seats_booked)
            .sum();
        assert_eq!(
            ride.seats_available + booked,
            ride.seats_total,
            "availability plus active bookings must equal capacity"
        );
    }

    #[tokio::test]
    async fn booking_decrements_availability() {
        let ledger = MemoryLedger::new();
        let ride = seed_ride(&ledger, 3).await;

        let booking = ledger
            .create_booking(ride.id, Uuid::new_v4(), 2, Some("main station".into()))
            .await
            .unwrap();
        assert_eq!(booking.seats_booked, 2);
        assert_eq!(ride_state(&ledger, ride.id).await.seats_available, 1);
        assert_invariant(&ledger, ride.id).await;
    }

    #[tokio::test]
    async fn overbooking_fails_and_leaves_state_untouched() {
        let ledger = MemoryLedger::new();
        let ride = seed_ride(&ledger, 3).await;
        let passenger = Uuid::new_v4();

        ledger
            .create_booking(ride.id, passenger, 2, None)
            .await
            .unwrap();
        let err = ledger
            .create_booking(ride.id, Uuid::new_v4(), 2, None)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientSeats { .. }));
        assert_eq!(ride_state(&ledger, ride.id).await.seats_available, 1);
        assert_invariant(&ledger, ride.id).await;
    }

    #[tokio::test]
    async fn cancel_releases_exactly_the_booked_seats() {
        let ledger = MemoryLedger::new();
        let ride = seed_ride(&ledger, 3).await;

        let booking = ledger
            .create_booking(ride.id, Uuid::new_v4(), 2, None)
            .await
            .unwrap();
        assert_eq!(ride_state(&ledger, ride.id).await.seats_available, 1);

        let canceled = ledger.cancel_booking(booking.id).await.unwrap();
        assert_eq!(canceled.status, BookingStatus::Canceled);
        assert_eq!(ride_state(&ledger, ride.id).await.seats_available, 3);
        assert_invariant(&ledger, ride.id).await;
    }

    #[tokio::test]
    async fn canceled_booking_is_gone_for_ledger_purposes() {
        let ledger = MemoryLedger::new();
        let ride = seed_ride(&ledger, 3).await;
        let booking = ledger
            .create_booking(ride.id, Uuid::new_v4(), 1, None)
            .await
            .unwrap();
        ledger.cancel_booking(booking.id).await.unwrap();

        assert!(matches!(
            ledger.cancel_booking(booking.id).await,
            Err(LedgerError::BookingNotFound(_))
        ));
        assert!(matches!(
            ledger.change_booking_seats(booking.id, 2).await,
            Err(LedgerError::BookingNotFound(_))
        ));
        // The double cancel must not release seats twice.
        assert_eq!(ride_state(&ledger, ride.id).await.seats_available, 3);
    }

    #[tokio::test]
    async fn departed_ride_refuses_bookings() {
        let ledger = MemoryLedger::new();
        let driver = Uuid::new_v4();
        let ride = RideRepository::create(
            &ledger,
            driver,
            NewRide {
                origin: "A".to_string(),
                destination: "B".to_string(),
                departure_at: Utc::now() - Duration::hours(1),
                seats_available: 4,
                price_per_seat: 0,
                notes: None,
            },
        )
        .await
        .unwrap();

        assert!(matches!(
            ledger.create_booking(ride.id, Uuid::new_v4(), 1, None).await,
            Err(LedgerError::RideClosed)
        ));
    }

    #[tokio::test]
    async fn resizing_moves_the_difference() {
        let ledger = MemoryLedger::new();
        let ride = seed_ride(&ledger, 3).await;
        let booking = ledger
            .create_booking(ride.id, Uuid::new_v4(), 2, None)
            .await
            .unwrap();

        // 2 -> 1 hands one seat back.
        let booking = ledger.change_booking_seats(booking.id, 1).await.unwrap();
        assert_eq!(booking.seats_booked, 1);
        assert_eq!(ride_state(&ledger, ride.id).await.seats_available, 2);

        // 1 -> 4 would need 3 seats with only 2 available; nothing moves.
        let err = ledger
            .change_booking_seats(booking.id, 4)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientSeats { .. }));
        let after = BookingRepository::find(&ledger, booking.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after.seats_booked, 1);
        assert_eq!(ride_state(&ledger, ride.id).await.seats_available, 2);
        assert_invariant(&ledger, ride.id).await;
    }

    #[tokio::test]
    async fn capacity_three_walkthrough() {
        let ledger = MemoryLedger::new();
        let ride = seed_ride(&ledger, 3).await;

        let first = ledger
            .create_booking(ride.id, Uuid::new_v4(), 2, None)
            .await
            .unwrap();
        assert_eq!(ride_state(&ledger, ride.id).await.seats_available, 1);

        assert!(matches!(
            ledger.create_booking(ride.id, Uuid::new_v4(), 2, None).await,
            Err(LedgerError::InsufficientSeats { .. })
        ));
        assert_eq!(ride_state(&ledger, ride.id).await.seats_available, 1);

        ledger.cancel_booking(first.id).await.unwrap();
        assert_eq!(ride_state(&ledger, ride.id).await.seats_available, 3);
    }

    #[tokio::test]
    async fn concurrent_bookings_never_oversubscribe() {
        let ledger = Arc::new(MemoryLedger::new());
        let ride = seed_ride(&ledger, 3).await;

        let mut handles = Vec::new();
        for _ in 0..10 {
            let ledger = Arc::clone(&ledger);
            let ride_id = ride.id;
            handles.push(tokio::spawn(async move {
                ledger.create_booking(ride_id, Uuid::new_v4(), 1, None).await
            }));
        }

        let mut granted = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => granted += 1,
                Err(LedgerError::RideFull) | Err(LedgerError::InsufficientSeats { .. }) => {}
                Err(other) => panic!("unexpected failure: {:?}", other),
            }
        }
        assert_eq!(granted, 3);
        let ride = ride_state(&ledger, ride.id).await;
        assert_eq!(ride.seats_available, 0);
        assert_invariant(&ledger, ride.id).await;
    }

    #[tokio::test]
    async fn driver_seat_edit_keeps_the_invariant() {
        let ledger = MemoryLedger::new();
        let ride = seed_ride(&ledger, 3).await;
        ledger
            .create_booking(ride.id, Uuid::new_v4(), 2, None)
            .await
            .unwrap();

        // Driver opens up two more seats: availability 1 -> 3.
        let updated = RideRepository::update(
            &ledger,
            ride.id,
            RideUpdate {
                seats_available: Some(3),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(updated.seats_available, 3);
        assert_eq!(updated.seats_total, 5);
        assert_invariant(&ledger, ride.id).await;
    }
}
