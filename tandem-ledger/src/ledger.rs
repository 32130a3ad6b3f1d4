use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use tandem_domain::{Booking, Ride};

/// Every way a seat-ledger operation can be refused. Business-rule
/// violations are detected before any write; `Conflict` and `Storage`
/// come out of the storage layer after validation passed.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("ride not found: {0}")]
    RideNotFound(Uuid),

    #[error("booking not found: {0}")]
    BookingNotFound(Uuid),

    #[error("seat count must be at least 1, got {0}")]
    InvalidSeatCount(i64),

    #[error("ride is no longer open for booking")]
    RideClosed,

    #[error("ride has no seats left")]
    RideFull,

    #[error("requested {requested} seats, only {available} available")]
    InsufficientSeats { requested: i32, available: i32 },

    #[error("concurrent update lost: {0}")]
    Conflict(String),

    #[error("storage failure: {0}")]
    Storage(String),
}

/// Maintains the seat-count invariant across concurrent booking
/// operations: for every ride, `seats_available` plus the seats held by
/// active bookings equals the ride's capacity at creation.
///
/// Each operation is a single atomic unit over the ride and the booking;
/// both records move together or not at all. None of the operations are
/// idempotent (a resubmitted create duplicates the booking, a resubmitted
/// cancel double-releases seats), so replay protection belongs to the
/// caller.
#[async_trait]
pub trait SeatLedger: Send + Sync {
    async fn create_booking(
        &self,
        ride_id: Uuid,
        passenger_id: Uuid,
        seats_requested: i64,
        pickup_location: Option<String>,
    ) -> Result<Booking, LedgerError>;

    async fn change_booking_seats(
        &self,
        booking_id: Uuid,
        new_seat_count: i64,
    ) -> Result<Booking, LedgerError>;

    async fn cancel_booking(&self, booking_id: Uuid) -> Result<Booking, LedgerError>;
}

fn seat_count(requested: i64) -> Result<i32, LedgerError> {
    if requested < 1 {
        return Err(LedgerError::InvalidSeatCount(requested));
    }
    i32::try_from(requested).map_err(|_| LedgerError::InvalidSeatCount(requested))
}

/// Rules for a new booking, evaluated in a fixed order: seat count, then
/// time window, then capacity floor, then capacity fit. First failure
/// wins. Returns the validated seat count.
pub fn validate_new_booking(
    ride: &Ride,
    seats_requested: i64,
    now: DateTime<Utc>,
) -> Result<i32, LedgerError> {
    let seats = seat_count(seats_requested)?;
    if ride.is_closed(now) {
        return Err(LedgerError::RideClosed);
    }
    if ride.seats_available < 1 {
        return Err(LedgerError::RideFull);
    }
    if seats > ride.seats_available {
        return Err(LedgerError::InsufficientSeats {
            requested: seats,
            available: ride.seats_available,
        });
    }
    Ok(seats)
}

/// Rules for resizing an existing booking. Returns the validated new
/// seat count together with the delta to subtract from the ride's
/// availability (negative delta hands seats back).
pub fn validate_seat_change(
    ride: &Ride,
    booking: &Booking,
    new_seat_count: i64,
) -> Result<(i32, i32), LedgerError> {
    let seats = seat_count(new_seat_count)?;
    let delta = seats - booking.seats_booked;
    if delta > 0 && ride.seats_available < delta {
        return Err(LedgerError::InsufficientSeats {
            requested: delta,
            available: ride.seats_available,
        });
    }
    Ok((seats, delta))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tandem_domain::BookingStatus;

    fn open_ride(seats_available: i32) -> Ride {
        let now = Utc::now();
        Ride {
            id: Uuid::new_v4(),
            driver_id: Uuid::new_v4(),
            origin: "Porto".to_string(),
            destination: "Lisbon".to_string(),
            departure_at: now + Duration::hours(6),
            seats_total: seats_available,
            seats_available,
            price_per_seat: 15,
            notes: None,
            is_done: false,
            created_at: now,
            updated_at: now,
        }
    }

    fn booking_of(ride: &Ride, seats: i32) -> Booking {
        let now = Utc::now();
        Booking {
            id: Uuid::new_v4(),
            ride_id: ride.id,
            passenger_id: Uuid::new_v4(),
            seats_booked: seats,
            pickup_location: None,
            status: BookingStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn accepts_request_within_capacity() {
        let ride = open_ride(4);
        assert_eq!(validate_new_booking(&ride, 3, Utc::now()).unwrap(), 3);
    }

    #[test]
    fn rejects_non_positive_seat_counts() {
        let ride = open_ride(4);
        assert!(matches!(
            validate_new_booking(&ride, 0, Utc::now()),
            Err(LedgerError::InvalidSeatCount(0))
        ));
        assert!(matches!(
            validate_new_booking(&ride, -2, Utc::now()),
            Err(LedgerError::InvalidSeatCount(-2))
        ));
    }

    #[test]
    fn seat_count_rule_fires_before_time_window_rule() {
        // Rule order matters: a bad seat count on a departed ride must
        // still report the seat count, not the closed ride.
        let mut ride = open_ride(4);
        ride.departure_at = Utc::now() - Duration::hours(1);
        assert!(matches!(
            validate_new_booking(&ride, 0, Utc::now()),
            Err(LedgerError::InvalidSeatCount(0))
        ));
    }

    #[test]
    fn rejects_departed_ride() {
        let mut ride = open_ride(4);
        ride.departure_at = Utc::now() - Duration::minutes(1);
        assert!(matches!(
            validate_new_booking(&ride, 1, Utc::now()),
            Err(LedgerError::RideClosed)
        ));
    }

    #[test]
    fn rejects_ride_marked_done() {
        let mut ride = open_ride(4);
        ride.is_done = true;
        assert!(matches!(
            validate_new_booking(&ride, 1, Utc::now()),
            Err(LedgerError::RideClosed)
        ));
    }

    #[test]
    fn full_ride_reported_before_insufficient_seats() {
        let mut ride = open_ride(4);
        ride.seats_available = 0;
        assert!(matches!(
            validate_new_booking(&ride, 2, Utc::now()),
            Err(LedgerError::RideFull)
        ));
    }

    #[test]
    fn oversized_request_reports_what_is_left() {
        let mut ride = open_ride(4);
        ride.seats_available = 1;
        match validate_new_booking(&ride, 2, Utc::now()) {
            Err(LedgerError::InsufficientSeats {
                requested,
                available,
            }) => {
                assert_eq!(requested, 2);
                assert_eq!(available, 1);
            }
            other => panic!("expected InsufficientSeats, got {:?}", other),
        }
    }

    #[test]
    fn shrinking_a_booking_needs_no_free_seats() {
        let mut ride = open_ride(3);
        ride.seats_available = 0;
        let booking = booking_of(&ride, 2);
        let (seats, delta) = validate_seat_change(&ride, &booking, 1).unwrap();
        assert_eq!(seats, 1);
        assert_eq!(delta, -1);
    }

    #[test]
    fn growing_a_booking_is_bounded_by_availability() {
        let mut ride = open_ride(3);
        ride.seats_available = 1;
        let booking = booking_of(&ride, 2);
        assert!(matches!(
            validate_seat_change(&ride, &booking, 4),
            Err(LedgerError::InsufficientSeats { .. })
        ));
        // Growing by exactly what is left is fine.
        let (seats, delta) = validate_seat_change(&ride, &booking, 3).unwrap();
        assert_eq!(seats, 3);
        assert_eq!(delta, 1);
    }

    #[test]
    fn seat_change_to_zero_is_invalid_not_a_cancel() {
        let ride = open_ride(3);
        let booking = booking_of(&ride, 2);
        assert!(matches!(
            validate_seat_change(&ride, &booking, 0),
            Err(LedgerError::InvalidSeatCount(0))
        ));
    }
}
