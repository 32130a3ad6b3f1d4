use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::error::Error;
use uuid::Uuid;

use tandem_domain::repository::BookingRepository;
use tandem_domain::ride::Ride;
use tandem_domain::{Booking, BookingStatus};
use tandem_ledger::ledger::{validate_new_booking, validate_seat_change, LedgerError, SeatLedger};

use crate::ride_repo::{select_ride_sql, RideRow};

const BOOKING_COLUMNS: &str = "id, ride_id, passenger_id, seats_booked, pickup_location, \
     status, created_at, updated_at";

#[derive(sqlx::FromRow)]
pub(crate) struct BookingRow {
    pub id: Uuid,
    pub ride_id: Uuid,
    pub passenger_id: Uuid,
    pub seats_booked: i32,
    pub pickup_location: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<BookingRow> for Booking {
    fn from(row: BookingRow) -> Self {
        Booking {
            id: row.id,
            ride_id: row.ride_id,
            passenger_id: row.passenger_id,
            seats_booked: row.seats_booked,
            pickup_location: row.pickup_location,
            status: BookingStatus::from_str(&row.status),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn select_booking_sql(suffix: &str) -> String {
    format!("SELECT {} FROM bookings {}", BOOKING_COLUMNS, suffix)
}

/// Serialization failures and deadlocks are the database telling us a
/// concurrent writer won; everything else is a storage fault.
fn map_db_err(err: sqlx::Error) -> LedgerError {
    if let sqlx::Error::Database(db) = &err {
        if let Some(code) = db.code() {
            if code == "40001" || code == "40P01" {
                return LedgerError::Conflict(db.message().to_string());
            }
        }
    }
    LedgerError::Storage(err.to_string())
}

pub struct PgBookingRepository {
    pool: PgPool,
}

impl PgBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookingRepository for PgBookingRepository {
    async fn find(&self, id: Uuid) -> Result<Option<Booking>, Box<dyn Error + Send + Sync>> {
        let row = sqlx::query_as::<_, BookingRow>(&select_booking_sql("WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Booking::from))
    }

    async fn list_by_passenger(
        &self,
        passenger_id: Uuid,
    ) -> Result<Vec<Booking>, Box<dyn Error + Send + Sync>> {
        let rows = sqlx::query_as::<_, BookingRow>(&select_booking_sql(
            "WHERE passenger_id = $1 ORDER BY created_at DESC",
        ))
        .bind(passenger_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Booking::from).collect())
    }
}

/// Seat ledger on PostgreSQL. Every operation is one transaction; the
/// ride row is taken `FOR UPDATE` before the read-validate-write
/// sequence, so concurrent operations on the same ride serialize at the
/// database. Dropping the transaction on any early return rolls both
/// writes back. Where a booking row and a ride row are both locked, the
/// booking is locked first.
pub struct PgSeatLedger {
    pool: PgPool,
}

impl PgSeatLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SeatLedger for PgSeatLedger {
    async fn create_booking(
        &self,
        ride_id: Uuid,
        passenger_id: Uuid,
        seats_requested: i64,
        pickup_location: Option<String>,
    ) -> Result<Booking, LedgerError> {
        let mut tx = self.pool.begin().await.map_err(map_db_err)?;

        let ride: Ride =
            sqlx::query_as::<_, RideRow>(&select_ride_sql("WHERE id = $1 FOR UPDATE"))
                .bind(ride_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(map_db_err)?
                .ok_or(LedgerError::RideNotFound(ride_id))?
                .into();

        let now = Utc::now();
        let seats = validate_new_booking(&ride, seats_requested, now)?;

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

        sqlx::query(
            r#"
            INSERT INTO bookings (id, ride_id, passenger_id, seats_booked, pickup_location,
                                  status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(booking.id)
        .bind(booking.ride_id)
        .bind(booking.passenger_id)
        .bind(booking.seats_booked)
        .bind(&booking.pickup_location)
        .bind(booking.status.as_str())
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(map_db_err)?;

        sqlx::query(
            "UPDATE rides SET seats_available = seats_available - $2, updated_at = $3 WHERE id = $1",
        )
        .bind(ride_id)
        .bind(seats)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(map_db_err)?;

        tx.commit().await.map_err(map_db_err)?;
        tracing::debug!(%ride_id, seats, "booking created");
        Ok(booking)
    }

    async fn change_booking_seats(
        &self,
        booking_id: Uuid,
        new_seat_count: i64,
    ) -> Result<Booking, LedgerError> {
        let mut tx = self.pool.begin().await.map_err(map_db_err)?;

        let mut booking: Booking = sqlx::query_as::<_, BookingRow>(&select_booking_sql(
            "WHERE id = $1 AND status = 'active' FOR UPDATE",
        ))
        .bind(booking_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_db_err)?
        .ok_or(LedgerError::BookingNotFound(booking_id))?
        .into();

        let ride: Ride =
            sqlx::query_as::<_, RideRow>(&select_ride_sql("WHERE id = $1 FOR UPDATE"))
                .bind(booking.ride_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(map_db_err)?
                .ok_or(LedgerError::RideNotFound(booking.ride_id))?
                .into();

        let now = Utc::now();
        let (seats, delta) = validate_seat_change(&ride, &booking, new_seat_count)?;

        sqlx::query(
            "UPDATE rides SET seats_available = seats_available - $2, updated_at = $3 WHERE id = $1",
        )
        .bind(ride.id)
        .bind(delta)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(map_db_err)?;

        sqlx::query("UPDATE bookings SET seats_booked = $2, updated_at = $3 WHERE id = $1")
            .bind(booking_id)
            .bind(seats)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(map_db_err)?;

        tx.commit().await.map_err(map_db_err)?;
        tracing::debug!(%booking_id, seats, delta, "booking resized");

        booking.seats_booked = seats;
        booking.updated_at = now;
        Ok(booking)
    }

    async fn cancel_booking(&self, booking_id: Uuid) -> Result<Booking, LedgerError> {
        let mut tx = self.pool.begin().await.map_err(map_db_err)?;

        let mut booking: Booking = sqlx::query_as::<_, BookingRow>(&select_booking_sql(
            "WHERE id = $1 AND status = 'active' FOR UPDATE",
        ))
        .bind(booking_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_db_err)?
        .ok_or(LedgerError::BookingNotFound(booking_id))?
        .into();

        // Lock the ride row too; the seats go back where they came from.
        let ride: Ride =
            sqlx::query_as::<_, RideRow>(&select_ride_sql("WHERE id = $1 FOR UPDATE"))
                .bind(booking.ride_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(map_db_err)?
                .ok_or(LedgerError::RideNotFound(booking.ride_id))?
                .into();

        let now = Utc::now();

        sqlx::query(
            "UPDATE rides SET seats_available = seats_available + $2, updated_at = $3 WHERE id = $1",
        )
        .bind(ride.id)
        .bind(booking.seats_booked)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(map_db_err)?;

        sqlx::query("UPDATE bookings SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(booking_id)
            .bind(BookingStatus::Canceled.as_str())
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(map_db_err)?;

        tx.commit().await.map_err(map_db_err)?;
        tracing::debug!(%booking_id, released = booking.seats_booked, "booking canceled");

        booking.status = BookingStatus::Canceled;
        booking.updated_at = now;
        Ok(booking)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booking_row_maps_status_text() {
        let now = Utc::now();
        let row = BookingRow {
            id: Uuid::new_v4(),
            ride_id: Uuid::new_v4(),
            passenger_id: Uuid::new_v4(),
            seats_booked: 2,
            pickup_location: Some("town hall".to_string()),
            status: "canceled".to_string(),
            created_at: now,
            updated_at: now,
        };
        let booking = Booking::from(row);
        assert_eq!(booking.status, BookingStatus::Canceled);
        assert!(!booking.is_active());
    }
}
