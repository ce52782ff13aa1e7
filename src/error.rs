use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::geocoder::GeocodeError;
use crate::models::parcel::ParcelStatus;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("parcel is {0} and accepts no further transitions")]
    InvalidState(ParcelStatus),

    #[error("action {action} is not allowed while parcel is {from}")]
    IllegalTransition { from: ParcelStatus, action: String },

    #[error("driver is not currently available")]
    DriverUnavailable,

    #[error("driver is already assigned to this parcel")]
    SameDriver,

    #[error("parcel is {0}; drivers can only be reassigned before pickup")]
    TooLateToReassign(ParcelStatus),

    #[error("parcel was modified concurrently; re-read and retry")]
    ConcurrentModification,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid coordinates: {0}")]
    InvalidCoordinates(String),

    #[error("geocoding provider timed out")]
    GeocodeTimeout,

    #[error("geocoding failed: {0}")]
    GeocodeFailed(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::BadRequest(_) => "bad_request",
            AppError::InvalidState(_) => "invalid_state",
            AppError::IllegalTransition { .. } => "illegal_transition",
            AppError::DriverUnavailable => "driver_unavailable",
            AppError::SameDriver => "same_driver",
            AppError::TooLateToReassign(_) => "too_late_to_reassign",
            AppError::ConcurrentModification => "concurrent_modification",
            AppError::Forbidden(_) => "forbidden",
            AppError::InvalidAddress(_) => "invalid_address",
            AppError::InvalidCoordinates(_) => "invalid_coordinates",
            AppError::GeocodeTimeout => "geocode_timeout",
            AppError::GeocodeFailed(_) => "geocode_failed",
            AppError::Internal(_) => "internal",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_)
            | AppError::InvalidAddress(_)
            | AppError::InvalidCoordinates(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidState(_)
            | AppError::IllegalTransition { .. }
            | AppError::DriverUnavailable
            | AppError::SameDriver
            | AppError::TooLateToReassign(_)
            | AppError::ConcurrentModification => StatusCode::CONFLICT,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::GeocodeTimeout => StatusCode::GATEWAY_TIMEOUT,
            AppError::GeocodeFailed(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<GeocodeError> for AppError {
    fn from(err: GeocodeError) -> Self {
        match err {
            GeocodeError::InvalidAddress(msg) => AppError::InvalidAddress(msg),
            GeocodeError::InvalidCoordinates(msg) => AppError::InvalidCoordinates(msg),
            GeocodeError::NotFound(query) => {
                AppError::NotFound(format!("no geocoding result for {query}"))
            }
            GeocodeError::Timeout(_) => AppError::GeocodeTimeout,
            GeocodeError::LookupFailed(msg) => AppError::GeocodeFailed(msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.to_string(),
            "kind": self.kind(),
        }));

        (status, body).into_response()
    }
}
