use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::tracking::generate_tracking_number;
use crate::engine::workflow::publish;
use crate::error::AppError;
use crate::geocoder::{GeocodeError, GeocodeResult, normalize_address};
use crate::models::event::TransitionEvent;
use crate::models::parcel::{
    Address, Parcel, ParcelStatus, Party, PaymentStatus, StatusHistoryEntry,
};
use crate::state::AppState;

const MAX_TRACKING_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateParcelRequest {
    pub sender: Party,
    pub recipient: Party,
    pub pickup_address: String,
    pub delivery_address: String,
    pub weight_kg: f64,
    #[serde(default)]
    pub declared_value: Option<f64>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub delivery_fee: Option<f64>,
}

/// Geocoding failures leave the coordinates unset; they never fail creation.
pub async fn create_parcel(
    state: &AppState,
    request: CreateParcelRequest,
    actor: Uuid,
) -> Result<Parcel, AppError> {
    validate(&request)?;

    let pickup_text = normalize_address(&request.pickup_address)?;
    let delivery_text = normalize_address(&request.delivery_address)?;

    let (pickup_lookup, delivery_lookup) = tokio::join!(
        state.geocoder.resolve(&pickup_text),
        state.geocoder.resolve(&delivery_text),
    );

    let now = Utc::now();
    let mut parcel = Parcel {
        id: Uuid::new_v4(),
        tracking_number: generate_tracking_number(now),
        sender: request.sender,
        recipient: request.recipient,
        assigned_driver: None,
        pickup: located(pickup_text, pickup_lookup),
        delivery: located(delivery_text, delivery_lookup),
        weight_kg: request.weight_kg,
        declared_value: request.declared_value,
        instructions: request
            .instructions
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty()),
        status: ParcelStatus::Pending,
        created_at: now,
        assigned_at: None,
        estimated_pickup_time: None,
        actual_pickup_time: None,
        estimated_delivery_time: None,
        actual_delivery_time: None,
        delivery_duration_minutes: None,
        delivery_fee: request.delivery_fee,
        payment_status: PaymentStatus::default(),
        delivery_confirmation: None,
        history: vec![StatusHistoryEntry {
            status: ParcelStatus::Pending,
            timestamp: now,
            actor,
            notes: None,
            location: None,
        }],
        version: 1,
    };

    let mut attempts = 1;
    while !state.parcels.try_insert(parcel.clone()) {
        if attempts >= MAX_TRACKING_ATTEMPTS {
            return Err(AppError::Internal(
                "could not allocate a unique tracking number".to_string(),
            ));
        }
        attempts += 1;
        parcel.tracking_number = generate_tracking_number(now);
    }

    state.metrics.parcels_created_total.inc();
    publish(
        state,
        TransitionEvent {
            parcel_id: parcel.id,
            tracking_number: parcel.tracking_number.clone(),
            from: None,
            to: ParcelStatus::Pending,
            action: "create".to_string(),
            actor,
            at: now,
        },
    );

    info!(
        parcel_id = %parcel.id,
        tracking_number = %parcel.tracking_number,
        pickup_resolved = parcel.pickup.location.is_some(),
        delivery_resolved = parcel.delivery.location.is_some(),
        "parcel created"
    );

    Ok(parcel)
}

fn validate(request: &CreateParcelRequest) -> Result<(), AppError> {
    if request.sender.name.trim().is_empty() {
        return Err(AppError::BadRequest("sender name cannot be empty".to_string()));
    }
    if request.recipient.name.trim().is_empty() {
        return Err(AppError::BadRequest(
            "recipient name cannot be empty".to_string(),
        ));
    }
    if !request.weight_kg.is_finite() || request.weight_kg <= 0.0 {
        return Err(AppError::BadRequest("weight_kg must be > 0".to_string()));
    }
    for (field, value) in [
        ("declared_value", request.declared_value),
        ("delivery_fee", request.delivery_fee),
    ] {
        if let Some(amount) = value {
            if !amount.is_finite() || amount < 0.0 {
                return Err(AppError::BadRequest(format!("{field} must be >= 0")));
            }
        }
    }
    Ok(())
}

fn located(text: String, lookup: Result<GeocodeResult, GeocodeError>) -> Address {
    match lookup {
        Ok(resolved) => Address {
            text,
            location: Some(resolved.location),
            canonical: Some(resolved.canonical_address),
        },
        Err(err) => {
            warn!(address = %text, error = %err, "address unresolved at creation");
            Address::unresolved(text)
        }
    }
}
