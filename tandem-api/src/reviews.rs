use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use tandem_domain::repository::{ReviewRepository, RideRepository};
use tandem_domain::review::{NewReview, Review, ReviewUpdate};

use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/reviews", get(my_reviews).post(create_review))
        .route(
            "/reviews/{review_id}",
            get(show_review).put(update_review).delete(delete_review),
        )
        .route("/rides/{ride_id}/reviews", get(ride_reviews))
}

async fn my_reviews(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<Review>>, AppError> {
    Ok(Json(state.reviews.list_by_author(user.id).await?))
}

async fn ride_reviews(
    State(state): State<AppState>,
    Path(ride_id): Path<Uuid>,
) -> Result<Json<Vec<Review>>, AppError> {
    Ok(Json(state.reviews.list_by_ride(ride_id).await?))
}

async fn create_review(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<NewReview>,
) -> Result<(StatusCode, Json<Review>), AppError> {
    if state.rides.find(body.ride_id).await?.is_none() {
        return Err(AppError::NotFoundError("Ride not found".to_string()));
    }
    check_rating(body.rating)?;

    let review = state.reviews.create(user.id, body).await?;
    Ok((StatusCode::CREATED, Json(review)))
}

async fn show_review(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(review_id): Path<Uuid>,
) -> Result<Json<Review>, AppError> {
    let review = state
        .reviews
        .find(review_id)
        .await?
        .ok_or_else(|| AppError::NotFoundError("Review not found".to_string()))?;
    Ok(Json(review))
}

async fn update_review(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(review_id): Path<Uuid>,
    Json(patch): Json<ReviewUpdate>,
) -> Result<Json<Review>, AppError> {
    if let Some(rating) = patch.rating {
        check_rating(rating)?;
    }
    let review = state
        .reviews
        .update(review_id, patch)
        .await?
        .ok_or_else(|| AppError::NotFoundError("Review not found".to_string()))?;
    Ok(Json(review))
}

async fn delete_review(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(review_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !state.reviews.delete(review_id).await? {
        return Err(AppError::NotFoundError("Review not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

fn check_rating(rating: i32) -> Result<(), AppError> {
    if !(1..=5).contains(&rating) {
        return Err(AppError::ValidationError(
            "rating must be between 1 and 5".to_string(),
        ));
    }
    Ok(())
}
