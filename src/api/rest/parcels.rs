use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::eligibility::{EligibilityCriteria, RankedCandidate};
use crate::engine::intake::{CreateParcelRequest, create_parcel};
use crate::engine::transitions::{Action, legal_actions};
use crate::engine::workflow::{TransitionOutcome, TransitionPayload, apply_transition, candidates};
use crate::error::AppError;
use crate::models::driver::VehicleType;
use crate::models::parcel::{Parcel, StatusHistoryEntry};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/parcels", post(create))
        .route("/parcels/:id", get(get_parcel))
        .route("/parcels/:id/history", get(get_history))
        .route("/parcels/:id/actions", get(get_actions))
        .route("/parcels/:id/candidates", get(list_candidates))
        .route("/parcels/:id/transitions", post(transition))
        .route("/tracking/:tracking_number", get(track))
}

#[derive(Deserialize)]
pub struct CreateParcelBody {
    /// Who is creating the parcel. Defaults to the sender's account.
    #[serde(default)]
    pub actor_id: Option<Uuid>,
    #[serde(flatten)]
    pub request: CreateParcelRequest,
}

#[derive(Deserialize)]
pub struct TransitionBody {
    pub action: Action,
    pub actor_id: Uuid,
    #[serde(flatten)]
    pub payload: TransitionPayload,
}

#[derive(Deserialize)]
pub struct CandidateQuery {
    pub vehicle_type: Option<VehicleType>,
    pub min_rating: Option<f64>,
}

async fn create(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateParcelBody>,
) -> Result<(StatusCode, Json<Parcel>), AppError> {
    let actor = body
        .actor_id
        .or(body.request.sender.account_id)
        .ok_or_else(|| {
            AppError::BadRequest("actor_id or sender.account_id is required".to_string())
        })?;

    let parcel = create_parcel(&state, body.request, actor).await?;
    Ok((StatusCode::CREATED, Json(parcel)))
}

async fn get_parcel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Parcel>, AppError> {
    Ok(Json(fetch(&state, id).await?))
}

async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<StatusHistoryEntry>>, AppError> {
    Ok(Json(fetch(&state, id).await?.history))
}

async fn get_actions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Action>>, AppError> {
    Ok(Json(legal_actions(fetch(&state, id).await?.status)))
}

async fn list_candidates(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<CandidateQuery>,
) -> Result<Json<Vec<RankedCandidate>>, AppError> {
    let criteria = EligibilityCriteria {
        vehicle_type: query.vehicle_type,
        min_rating: query.min_rating,
        ..Default::default()
    };
    Ok(Json(candidates(&state, id, criteria).await?))
}

async fn transition(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<TransitionBody>,
) -> Result<Json<TransitionOutcome>, AppError> {
    let outcome = apply_transition(&state, id, body.action, body.actor_id, body.payload).await?;
    Ok(Json(outcome))
}

async fn track(
    State(state): State<Arc<AppState>>,
    Path(tracking_number): Path<String>,
) -> Result<Json<Parcel>, AppError> {
    let parcel = state
        .parcels
        .find_by_tracking_number(tracking_number.trim())
        .ok_or_else(|| AppError::NotFound(format!("tracking number {tracking_number} not found")))?;

    Ok(Json(parcel))
}

async fn fetch(state: &AppState, id: Uuid) -> Result<Parcel, AppError> {
    state
        .parcels
        .get(id)
        .ok_or_else(|| AppError::NotFound(format!("parcel {id} not found")))
}
