use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::error::Error;

use tandem_ledger::LedgerError;

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    AuthorizationError(String),
    ValidationError(String),
    NotFoundError(String),
    Ledger(LedgerError),
    InternalServerError(String),
    Anyhow(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, error_message) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED", msg),
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, "INVALID_INPUT", msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            AppError::Ledger(err) => return ledger_response(err),
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "Internal Server Error".to_string(),
                )
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
            "code": code,
        }));

        (status, body).into_response()
    }
}

/// Each ledger rejection keeps its own stable code so callers can branch
/// on `code` instead of matching message strings.
fn ledger_response(err: LedgerError) -> Response {
    let (status, code) = match &err {
        LedgerError::RideNotFound(_) => (StatusCode::NOT_FOUND, "RIDE_NOT_FOUND"),
        LedgerError::BookingNotFound(_) => (StatusCode::NOT_FOUND, "BOOKING_NOT_FOUND"),
        LedgerError::InvalidSeatCount(_) => (StatusCode::BAD_REQUEST, "INVALID_SEAT_COUNT"),
        LedgerError::RideClosed => (StatusCode::BAD_REQUEST, "RIDE_CLOSED"),
        LedgerError::RideFull => (StatusCode::BAD_REQUEST, "RIDE_FULL"),
        LedgerError::InsufficientSeats { .. } => (StatusCode::BAD_REQUEST, "INSUFFICIENT_SEATS"),
        LedgerError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
        LedgerError::Storage(msg) => {
            tracing::error!("Ledger storage failure: {}", msg);
            let body = Json(json!({
                "error": "Internal Server Error",
                "code": "INTERNAL",
            }));
            return (StatusCode::INTERNAL_SERVER_ERROR, body).into_response();
        }
    };

    let body = Json(json!({
        "error": err.to_string(),
        "code": code,
    }));
    (status, body).into_response()
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        Self::Ledger(err)
    }
}

impl From<Box<dyn Error + Send + Sync>> for AppError {
    fn from(err: Box<dyn Error + Send + Sync>) -> Self {
        Self::InternalServerError(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Anyhow(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn ledger_errors_map_to_distinct_statuses() {
        assert_eq!(
            status_of(LedgerError::RideNotFound(Uuid::new_v4()).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(LedgerError::BookingNotFound(Uuid::new_v4()).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(LedgerError::InvalidSeatCount(0).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(LedgerError::RideClosed.into()), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(LedgerError::RideFull.into()), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(
                LedgerError::InsufficientSeats {
                    requested: 4,
                    available: 1
                }
                .into()
            ),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(LedgerError::Conflict("serialization".into()).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(LedgerError::Storage("boom".into()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn storage_details_are_not_leaked() {
        let response = AppError::from(LedgerError::Storage("connection refused".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
