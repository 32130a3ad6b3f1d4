use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A scheduled trip offered by a driver with a fixed seat capacity.
///
/// `seats_total` is the capacity at creation time; `seats_available` is
/// what the seat ledger still has left to hand out. For every ride,
/// `seats_available + seats held by active bookings == seats_total`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ride {
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

impl Ride {
    /// A ride stops accepting bookings once it has departed or the
    /// driver marked it done.
    pub fn is_closed(&self, now: DateTime<Utc>) -> bool {
        self.is_done || self.departure_at <= now
    }
}

/// Payload for publishing a new ride. The driver id comes from the
/// authenticated caller, never from the body.
#[derive(Debug, Clone, Deserialize)]
pub struct NewRide {
    pub origin: String,
    pub destination: String,
    pub departure_at: DateTime<Utc>,
    pub seats_available: i32,
    #[serde(default)]
    pub price_per_seat: i32,
    pub notes: Option<String>,
}

/// Driver edit of ride details. All fields optional; absent fields keep
/// their current value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RideUpdate {
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub departure_at: Option<DateTime<Utc>>,
    pub seats_available: Option<i32>,
    pub price_per_seat: Option<i32>,
    pub notes: Option<String>,
}
