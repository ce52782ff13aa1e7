use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::eligibility::{EligibilityCriteria, RankedCandidate, eligible, rank_candidates};
use crate::engine::transitions::{Action, is_past_pickup, target_status};
use crate::error::AppError;
use crate::geo::estimate_route;
use crate::geocoder::Geocoder;
use crate::models::driver::{Driver, GeoPoint};
use crate::models::event::TransitionEvent;
use crate::models::parcel::{
    Address, DeliveryConfirmation, Parcel, ParcelStatus, StatusHistoryEntry,
};
use crate::state::AppState;

/// Actor recorded for transitions the service applies on its own.
pub const SYSTEM_ACTOR: Uuid = Uuid::nil();

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransitionPayload {
    #[serde(default)]
    pub driver_id: Option<Uuid>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub signature: Option<String>,
    /// Rejects the transition if the parcel moved past this version.
    #[serde(default)]
    pub expected_version: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransitionOutcome {
    pub parcel: Parcel,
    pub entry: StatusHistoryEntry,
}

pub async fn apply_transition(
    state: &AppState,
    parcel_id: Uuid,
    action: Action,
    actor: Uuid,
    payload: TransitionPayload,
) -> Result<TransitionOutcome, AppError> {
    let start = Instant::now();
    let result = transition(state, parcel_id, action, actor, payload).await;

    let outcome = match &result {
        Ok(_) => "success",
        Err(err) => err.kind(),
    };
    state
        .metrics
        .transitions_total
        .with_label_values(&[action.as_str(), outcome])
        .inc();
    state
        .metrics
        .transition_latency_seconds
        .with_label_values(&[action.as_str()])
        .observe(start.elapsed().as_secs_f64());

    if let Err(err) = &result {
        info!(parcel_id = %parcel_id, action = %action, error = %err, "transition rejected");
    }

    result
}

async fn transition(
    state: &AppState,
    parcel_id: Uuid,
    action: Action,
    actor: Uuid,
    payload: TransitionPayload,
) -> Result<TransitionOutcome, AppError> {
    let writer = state.parcels.lock_for_update(parcel_id)?;
    let mut parcel = writer.current();

    let from = parcel.status;
    if from.is_terminal() {
        return Err(AppError::InvalidState(from));
    }
    if let Some(expected) = payload.expected_version {
        if expected != parcel.version {
            return Err(AppError::ConcurrentModification);
        }
    }
    if action == Action::Reassign && is_past_pickup(from) {
        return Err(AppError::TooLateToReassign(from));
    }
    let to = target_status(from, action).ok_or_else(|| AppError::IllegalTransition {
        from,
        action: action.to_string(),
    })?;

    let now = next_timestamp(&parcel);
    let mut origin = payload.location;

    if action.needs_driver() {
        let driver_id = payload.driver_id.ok_or_else(|| {
            AppError::BadRequest(format!("driver_id is required to {action}"))
        })?;
        let driver = check_assignable(state, &parcel, driver_id)?;

        parcel.assigned_driver = Some(driver.id);
        parcel.assigned_at = Some(now);
        origin = driver.location;
    }

    match action {
        Action::Assign | Action::Reassign => {}
        Action::ConfirmPickup => {
            parcel.actual_pickup_time = Some(now);
        }
        Action::Depart => {
            origin = origin.or_else(|| current_driver_location(state, &parcel));
        }
        Action::ArriveAtRecipient => {
            parcel.actual_delivery_time = Some(now);
            parcel.delivery_duration_minutes = parcel
                .actual_pickup_time
                .map(|picked_up| (now - picked_up).num_minutes());
        }
        Action::ConfirmDelivery => {
            parcel.delivery_confirmation = Some(DeliveryConfirmation {
                delivered_to_recipient: true,
                confirmed_at: now,
                confirmed_by: actor,
                signature: payload.signature.clone(),
                notes: payload.notes.clone(),
                auto_confirmed: actor == SYSTEM_ACTOR,
            });
        }
        Action::MarkComplete => {
            if parcel.sender.account_id != Some(actor) {
                return Err(AppError::Forbidden(
                    "only the requesting customer can mark a parcel complete".to_string(),
                ));
            }
        }
        Action::Cancel => {}
    }

    if matches!(
        to,
        ParcelStatus::Assigned | ParcelStatus::PickedUp | ParcelStatus::InTransit
    ) {
        refresh_estimates(&state.geocoder, &mut parcel, to, origin, now).await;
    }

    let entry = StatusHistoryEntry {
        status: to,
        timestamp: now,
        actor,
        notes: payload.notes,
        location: payload.location,
    };
    parcel.status = to;
    parcel.history.push(entry.clone());
    parcel.version += 1;

    writer.commit(parcel.clone());

    if to == ParcelStatus::Delivered {
        record_completed_delivery(state, &parcel);
    }

    publish(
        state,
        TransitionEvent {
            parcel_id: parcel.id,
            tracking_number: parcel.tracking_number.clone(),
            from: Some(from),
            to,
            action: action.to_string(),
            actor,
            at: now,
        },
    );

    info!(
        parcel_id = %parcel.id,
        tracking_number = %parcel.tracking_number,
        from = %from,
        to = %to,
        actor = %actor,
        "parcel transitioned"
    );

    Ok(TransitionOutcome { parcel, entry })
}

pub async fn candidates(
    state: &AppState,
    parcel_id: Uuid,
    mut criteria: EligibilityCriteria,
) -> Result<Vec<RankedCandidate>, AppError> {
    let parcel = state
        .parcels
        .get(parcel_id)
        .ok_or_else(|| AppError::NotFound(format!("parcel {parcel_id} not found")))?;

    criteria.require_available = true;
    criteria.exclude_ids.extend(parcel.assigned_driver);

    let pool = eligible(&state.roster(), &criteria);
    Ok(rank_candidates(pool, parcel.pickup.location.as_ref()))
}

pub(crate) fn publish(state: &AppState, event: TransitionEvent) {
    // No subscribers is fine; the notification relay may not be running.
    let _ = state.transition_events_tx.send(event);
}

/// History timestamps never go backwards, even if the wall clock does.
fn next_timestamp(parcel: &Parcel) -> DateTime<Utc> {
    let now = Utc::now();
    match parcel.last_history_entry() {
        Some(last) if last.timestamp > now => last.timestamp,
        _ => now,
    }
}

fn check_assignable(state: &AppState, parcel: &Parcel, driver_id: Uuid) -> Result<Driver, AppError> {
    let driver = state
        .drivers
        .get(&driver_id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("driver {driver_id} not found")))?;

    if parcel.assigned_driver == Some(driver_id) {
        return Err(AppError::SameDriver);
    }

    let criteria = EligibilityCriteria {
        require_available: true,
        exclude_ids: parcel.assigned_driver.into_iter().collect(),
        ..Default::default()
    };
    if eligible(std::slice::from_ref(&driver), &criteria).is_empty() {
        return Err(AppError::DriverUnavailable);
    }

    Ok(driver)
}

fn current_driver_location(state: &AppState, parcel: &Parcel) -> Option<GeoPoint> {
    let driver_id = parcel.assigned_driver?;
    state.drivers.get(&driver_id)?.location
}

fn record_completed_delivery(state: &AppState, parcel: &Parcel) {
    let Some(driver_id) = parcel.assigned_driver else {
        return;
    };
    if let Some(mut driver) = state.drivers.get_mut(&driver_id) {
        driver.completed_deliveries = driver.completed_deliveries.saturating_add(1);
        driver.updated_at = Utc::now();
    }
}

/// Failures leave the existing estimates untouched.
async fn refresh_estimates(
    geocoder: &Geocoder,
    parcel: &mut Parcel,
    to: ParcelStatus,
    origin: Option<GeoPoint>,
    now: DateTime<Utc>,
) {
    let parcel_id = parcel.id;
    let (pickup, delivery) = tokio::join!(
        locate(geocoder, parcel_id, &mut parcel.pickup),
        locate(geocoder, parcel_id, &mut parcel.delivery),
    );

    let Some(delivery) = delivery else {
        return;
    };

    match to {
        ParcelStatus::Assigned => {
            let Some(pickup) = pickup else {
                return;
            };
            let pickup_eta = origin
                .and_then(|driver_at| eta_minutes(parcel_id, &driver_at, &pickup))
                .map(|minutes| now + Duration::minutes(minutes));
            if pickup_eta.is_some() {
                parcel.estimated_pickup_time = pickup_eta;
            }
            if let Some(minutes) = eta_minutes(parcel_id, &pickup, &delivery) {
                parcel.estimated_delivery_time =
                    Some(pickup_eta.unwrap_or(now) + Duration::minutes(minutes));
            }
        }
        ParcelStatus::PickedUp => {
            let Some(pickup) = pickup else {
                return;
            };
            if let Some(minutes) = eta_minutes(parcel_id, &pickup, &delivery) {
                parcel.estimated_delivery_time = Some(now + Duration::minutes(minutes));
            }
        }
        ParcelStatus::InTransit => {
            let Some(from) = origin.or(pickup) else {
                return;
            };
            if let Some(minutes) = eta_minutes(parcel_id, &from, &delivery) {
                parcel.estimated_delivery_time = Some(now + Duration::minutes(minutes));
            }
        }
        _ => {}
    }
}

async fn locate(geocoder: &Geocoder, parcel_id: Uuid, address: &mut Address) -> Option<GeoPoint> {
    if let Some(location) = address.location {
        return Some(location);
    }

    match geocoder.resolve(&address.text).await {
        Ok(resolved) => {
            address.location = Some(resolved.location);
            address.canonical = Some(resolved.canonical_address);
            Some(resolved.location)
        }
        Err(err) => {
            warn!(
                parcel_id = %parcel_id,
                address = %address.text,
                error = %err,
                "address unresolved; leaving estimate unchanged"
            );
            None
        }
    }
}

fn eta_minutes(parcel_id: Uuid, from: &GeoPoint, to: &GeoPoint) -> Option<i64> {
    match estimate_route(from, to) {
        Ok(estimate) => Some(i64::from(estimate.eta_minutes)),
        Err(err) => {
            warn!(parcel_id = %parcel_id, error = %err, "route estimate failed");
            None
        }
    }
}
