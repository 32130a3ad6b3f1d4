use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use uuid::Uuid;

use tandem_domain::repository::RideRepository;
use tandem_domain::ride::{NewRide, Ride, RideUpdate};

use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/rides", get(list_rides).post(create_ride))
        .route("/rides/mine", get(my_rides))
        .route(
            "/rides/{ride_id}",
            get(show_ride).put(update_ride).delete(delete_ride),
        )
        .route("/rides/{ride_id}/done", put(mark_ride_done))
}

async fn list_rides(State(state): State<AppState>) -> Result<Json<Vec<Ride>>, AppError> {
    Ok(Json(state.rides.list().await?))
}

async fn create_ride(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<NewRide>,
) -> Result<(StatusCode, Json<Ride>), AppError> {
    if body.origin.trim().is_empty() || body.destination.trim().is_empty() {
        return Err(AppError::ValidationError(
            "origin and destination are required".to_string(),
        ));
    }
    if body.seats_available < 1 {
        return Err(AppError::ValidationError(
            "a ride needs at least one seat".to_string(),
        ));
    }
    if body.price_per_seat < 0 {
        return Err(AppError::ValidationError(
            "price_per_seat cannot be negative".to_string(),
        ));
    }

    let ride = state.rides.create(user.id, body).await?;
    Ok((StatusCode::CREATED, Json(ride)))
}

async fn show_ride(
    State(state): State<AppState>,
    Path(ride_id): Path<Uuid>,
) -> Result<Json<Ride>, AppError> {
    let ride = state
        .rides
        .find(ride_id)
        .await?
        .ok_or_else(|| AppError::NotFoundError("Ride not found".to_string()))?;
    Ok(Json(ride))
}

async fn my_rides(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<Ride>>, AppError> {
    Ok(Json(state.rides.list_by_driver(user.id).await?))
}

async fn update_ride(
    State(state): State<AppState>,
    user: AuthUser,
    Path(ride_id): Path<Uuid>,
    Json(patch): Json<RideUpdate>,
) -> Result<Json<Ride>, AppError> {
    require_owner(&state, ride_id, user).await?;

    if let Some(origin) = &patch.origin {
        if origin.trim().is_empty() {
            return Err(AppError::ValidationError("origin cannot be blank".to_string()));
        }
    }
    if let Some(destination) = &patch.destination {
        if destination.trim().is_empty() {
            return Err(AppError::ValidationError(
                "destination cannot be blank".to_string(),
            ));
        }
    }
    if let Some(seats) = patch.seats_available {
        if seats < 1 {
            return Err(AppError::ValidationError(
                "a ride needs at least one seat".to_string(),
            ));
        }
    }
    if let Some(price) = patch.price_per_seat {
        if price < 0 {
            return Err(AppError::ValidationError(
                "price_per_seat cannot be negative".to_string(),
            ));
        }
    }

    let ride = state
        .rides
        .update(ride_id, patch)
        .await?
        .ok_or_else(|| AppError::NotFoundError("Ride not found".to_string()))?;
    Ok(Json(ride))
}

async fn mark_ride_done(
    State(state): State<AppState>,
    user: AuthUser,
    Path(ride_id): Path<Uuid>,
) -> Result<Json<Ride>, AppError> {
    require_owner(&state, ride_id, user).await?;
    let ride = state
        .rides
        .mark_done(ride_id)
        .await?
        .ok_or_else(|| AppError::NotFoundError("Ride not found".to_string()))?;
    Ok(Json(ride))
}

async fn delete_ride(
    State(state): State<AppState>,
    user: AuthUser,
    Path(ride_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    require_owner(&state, ride_id, user).await?;
    if !state.rides.delete(ride_id).await? {
        return Err(AppError::NotFoundError("Ride not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Ride details are the driver's to change.
async fn require_owner(state: &AppState, ride_id: Uuid, user: AuthUser) -> Result<Ride, AppError> {
    let ride = state
        .rides
        .find(ride_id)
        .await?
        .ok_or_else(|| AppError::NotFoundError("Ride not found".to_string()))?;
    if ride.driver_id != user.id {
        return Err(AppError::AuthorizationError(
            "Only the driver may change this ride".to_string(),
        ));
    }
    Ok(ride)
}
