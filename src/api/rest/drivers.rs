use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{patch, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::eligibility::{EligibilityCriteria, is_eligible};
use crate::error::AppError;
use crate::geo::validate_point;
use crate::models::driver::{Driver, GeoPoint, VehicleType};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/drivers", post(register_driver).get(list_drivers))
        .route("/drivers/:id/availability", patch(update_availability))
        .route("/drivers/:id/location", patch(update_location))
}

#[derive(Deserialize)]
pub struct RegisterDriverRequest {
    pub name: String,
    pub vehicle_type: VehicleType,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    pub rating: f64,
    #[serde(default = "available_by_default")]
    pub available: bool,
}

fn available_by_default() -> bool {
    true
}

#[derive(Deserialize)]
pub struct DriverQuery {
    pub available: Option<bool>,
    pub vehicle_type: Option<VehicleType>,
    pub min_rating: Option<f64>,
}

#[derive(Deserialize)]
pub struct UpdateAvailabilityRequest {
    pub available: bool,
}

#[derive(Deserialize)]
pub struct UpdateLocationRequest {
    pub location: GeoPoint,
}

async fn register_driver(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterDriverRequest>,
) -> Result<(StatusCode, Json<Driver>), AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }
    if let Some(location) = &payload.location {
        validate_point(location)?;
    }

    let driver = Driver {
        id: Uuid::new_v4(),
        name: payload.name.trim().to_string(),
        vehicle_type: payload.vehicle_type,
        available: payload.available,
        location: payload.location,
        rating: payload.rating.clamp(0.0, 5.0),
        completed_deliveries: 0,
        updated_at: Utc::now(),
    };

    state.drivers.insert(driver.id, driver.clone());
    Ok((StatusCode::CREATED, Json(driver)))
}

async fn list_drivers(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DriverQuery>,
) -> Json<Vec<Driver>> {
    let criteria = EligibilityCriteria {
        vehicle_type: query.vehicle_type,
        min_rating: query.min_rating,
        ..Default::default()
    };

    let drivers = state
        .roster()
        .into_iter()
        .filter(|driver| query.available.is_none_or(|wanted| driver.available == wanted))
        .filter(|driver| is_eligible(driver, &criteria))
        .collect();

    Json(drivers)
}

async fn update_availability(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateAvailabilityRequest>,
) -> Result<Json<Driver>, AppError> {
    let mut driver = state
        .drivers
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("driver {id} not found")))?;

    driver.available = payload.available;
    driver.updated_at = Utc::now();

    Ok(Json(driver.clone()))
}

async fn update_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateLocationRequest>,
) -> Result<Json<Driver>, AppError> {
    validate_point(&payload.location)?;

    let mut driver = state
        .drivers
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("driver {id} not found")))?;

    driver.location = Some(payload.location);
    driver.updated_at = Utc::now();

    Ok(Json(driver.clone()))
}
