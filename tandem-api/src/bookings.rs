use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use tandem_domain::repository::BookingRepository;
use tandem_domain::Booking;
use tandem_ledger::SeatLedger;

use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct CreateBookingRequest {
    ride_id: Uuid,
    seats_booked: i64,
    pickup_location: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpdateBookingRequest {
    seats_booked: i64,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/bookings", get(my_bookings).post(create_booking))
        .route(
            "/bookings/{booking_id}",
            get(show_booking).put(update_booking).delete(cancel_booking),
        )
}

async fn my_bookings(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<Booking>>, AppError> {
    Ok(Json(state.bookings.list_by_passenger(user.id).await?))
}

/// All seat movement goes through the ledger: the booking insert and the
/// ride decrement land together or not at all.
async fn create_booking(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let booking = state
        .ledger
        .create_booking(body.ride_id, user.id, body.seats_booked, body.pickup_location)
        .await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

async fn show_booking(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    let booking = state
        .bookings
        .find(booking_id)
        .await?
        .ok_or_else(|| AppError::NotFoundError("Booking not found".to_string()))?;
    Ok(Json(booking))
}

// Booking edit and cancel are open to any signed-in user, not just the
// owning passenger.
// TODO: enforce passenger ownership once the authorization policy settles.
async fn update_booking(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(booking_id): Path<Uuid>,
    Json(body): Json<UpdateBookingRequest>,
) -> Result<Json<Booking>, AppError> {
    let booking = state
        .ledger
        .change_booking_seats(booking_id, body.seats_booked)
        .await?;
    Ok(Json(booking))
}

async fn cancel_booking(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    let booking = state.ledger.cancel_booking(booking_id).await?;
    Ok(Json(booking))
}
