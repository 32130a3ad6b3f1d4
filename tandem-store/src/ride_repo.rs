use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::error::Error;
use uuid::Uuid;

use tandem_domain::repository::RideRepository;
use tandem_domain::ride::{NewRide, Ride, RideUpdate};

const RIDE_COLUMNS: &str = "id, driver_id, origin, destination, departure_at, seats_total, \
     seats_available, price_per_seat, notes, is_done, created_at, updated_at";

#[derive(sqlx::FromRow)]
pub(crate) struct RideRow {
    pub id: Uuid,
    pub driver_id: Uuid,
    pub origin: String,
    pub destination: String,
    pub departure_at: DateTime<Utc>,
    pub seats_total: i32,
    pub seats_available: i32,
    pub price_per_seat: i32,
    pub notes: Option<String>,
    pub is_done: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<RideRow> for Ride {
    fn from(row: RideRow) -> Self {
        Ride {
            id: row.id,
            driver_id: row.driver_id,
            origin: row.origin,
            destination: row.destination,
            departure_at: row.departure_at,
            seats_total: row.seats_total,
            seats_available: row.seats_available,
            price_per_seat: row.price_per_seat,
            notes: row.notes,
            is_done: row.is_done,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

pub(crate) fn select_ride_sql(suffix: &str) -> String {
    format!("SELECT {} FROM rides {}", RIDE_COLUMNS, suffix)
}

pub struct PgRideRepository {
    pool: PgPool,
}

impl PgRideRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RideRepository for PgRideRepository {
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

        sqlx::query(
            r#"
            INSERT INTO rides (id, driver_id, origin, destination, departure_at, seats_total,
                               seats_available, price_per_seat, notes, is_done, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(ride.id)
        .bind(ride.driver_id)
        .bind(&ride.origin)
        .bind(&ride.destination)
        .bind(ride.departure_at)
        .bind(ride.seats_total)
        .bind(ride.seats_available)
        .bind(ride.price_per_seat)
        .bind(&ride.notes)
        .bind(ride.is_done)
        .bind(ride.created_at)
        .bind(ride.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(ride)
    }

    async fn find(&self, id: Uuid) -> Result<Option<Ride>, Box<dyn Error + Send + Sync>> {
        let row = sqlx::query_as::<_, RideRow>(&select_ride_sql("WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Ride::from))
    }

    async fn list(&self) -> Result<Vec<Ride>, Box<dyn Error + Send + Sync>> {
        let rows = sqlx::query_as::<_, RideRow>(&select_ride_sql("ORDER BY departure_at"))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Ride::from).collect())
    }

    async fn list_by_driver(
        &self,
        driver_id: Uuid,
    ) -> Result<Vec<Ride>, Box<dyn Error + Send + Sync>> {
        let rows = sqlx::query_as::<_, RideRow>(&select_ride_sql(
            "WHERE driver_id = $1 ORDER BY departure_at",
        ))
        .bind(driver_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Ride::from).collect())
    }

    async fn update(
        &self,
        id: Uuid,
        patch: RideUpdate,
    ) -> Result<Option<Ride>, Box<dyn Error + Send + Sync>> {
        let mut tx = self.pool.begin().await?;

        let Some(row) = sqlx::query_as::<_, RideRow>(&select_ride_sql("WHERE id = $1 FOR UPDATE"))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };
        let mut ride = Ride::from(row);

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
            // The driver sets what is still on offer; capacity follows so
            // availability plus active bookings keeps adding up.
            let booked: i64 = sqlx::query_scalar(
                "SELECT COALESCE(SUM(seats_booked), 0) FROM bookings \
                 WHERE ride_id = $1 AND status = 'active'",
            )
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
            ride.seats_available = seats;
            ride.seats_total = seats + booked as i32;
        }
        ride.updated_at = Utc::now();

        sqlx::query(
            r#"
            UPDATE rides
            SET origin = $2, destination = $3, departure_at = $4, seats_total = $5,
                seats_available = $6, price_per_seat = $7, notes = $8, updated_at = $9
            WHERE id = $1
            "#,
        )
        .bind(ride.id)
        .bind(&ride.origin)
        .bind(&ride.destination)
        .bind(ride.departure_at)
        .bind(ride.seats_total)
        .bind(ride.seats_available)
        .bind(ride.price_per_seat)
        .bind(&ride.notes)
        .bind(ride.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(ride))
    }

    async fn mark_done(&self, id: Uuid) -> Result<Option<Ride>, Box<dyn Error + Send + Sync>> {
        let row = sqlx::query_as::<_, RideRow>(&format!(
            "UPDATE rides SET is_done = TRUE, updated_at = $2 WHERE id = $1 RETURNING {}",
            RIDE_COLUMNS
        ))
        .bind(id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Ride::from))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, Box<dyn Error + Send + Sync>> {
        // Bookings and reviews go with the ride via ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM rides WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
