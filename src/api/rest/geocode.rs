use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::geo::{RouteEstimate, estimate_route};
use crate::geocoder::{GeocodeResult, ResolvedLocation, Suggestions};
use crate::models::driver::GeoPoint;
use crate::state::AppState;

const DEFAULT_SUGGESTIONS: usize = 5;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/geocode/resolve", get(resolve))
        .route("/geocode/suggest", get(suggest))
        .route("/geocode/reverse", get(reverse))
        .route("/estimate", post(estimate))
}

#[derive(Deserialize)]
pub struct ResolveQuery {
    pub address: String,
    /// Return the default service-area location instead of failing.
    #[serde(default)]
    pub fallback: bool,
}

#[derive(Deserialize)]
pub struct SuggestQuery {
    pub q: String,
    pub limit: Option<usize>,
}

#[derive(Deserialize)]
pub struct ReverseQuery {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Serialize)]
pub struct ReverseResponse {
    pub location: GeoPoint,
    pub address: String,
}

#[derive(Deserialize)]
pub struct EstimateRequest {
    pub from: GeoPoint,
    pub to: GeoPoint,
}

async fn resolve(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ResolveQuery>,
) -> Result<Json<ResolvedLocation>, AppError> {
    if query.fallback {
        return Ok(Json(state.geocoder.resolve_or_fallback(&query.address).await?));
    }

    let GeocodeResult {
        location,
        canonical_address,
    } = state.geocoder.resolve(&query.address).await?;

    Ok(Json(ResolvedLocation {
        location,
        canonical_address,
        approximate: false,
    }))
}

async fn suggest(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SuggestQuery>,
) -> Json<Suggestions> {
    let limit = query.limit.unwrap_or(DEFAULT_SUGGESTIONS);
    Json(state.geocoder.suggest(&query.q, limit).await)
}

async fn reverse(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ReverseQuery>,
) -> Result<Json<ReverseResponse>, AppError> {
    let address = state.geocoder.reverse_resolve(query.lat, query.lng).await?;

    Ok(Json(ReverseResponse {
        location: GeoPoint::new(query.lat, query.lng),
        address,
    }))
}

async fn estimate(Json(payload): Json<EstimateRequest>) -> Result<Json<RouteEstimate>, AppError> {
    Ok(Json(estimate_route(&payload.from, &payload.to)?))
}
