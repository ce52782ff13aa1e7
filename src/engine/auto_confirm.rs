use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::engine::transitions::Action;
use crate::engine::workflow::{SYSTEM_ACTOR, TransitionPayload, apply_transition};
use crate::models::parcel::ParcelStatus;
use crate::state::AppState;

pub const AUTO_CONFIRM_NOTE: &str = "confirmed automatically after grace period";

/// Confirms parcels left in `delivered_to_recipient` longer than `grace`.
pub async fn run_auto_confirm_sweeper(state: Arc<AppState>, grace: Duration, interval: Duration) {
    info!(
        grace_secs = grace.as_secs(),
        interval_secs = interval.as_secs(),
        "auto-confirm sweeper started"
    );

    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let confirmed = sweep_overdue(&state, grace, Utc::now()).await;
        if confirmed > 0 {
            info!(confirmed, "auto-confirmed delivered parcels");
        }
    }
}

pub async fn sweep_overdue(state: &AppState, grace: Duration, now: DateTime<Utc>) -> usize {
    let mut confirmed = 0;

    for parcel in state
        .parcels
        .in_status(ParcelStatus::DeliveredToRecipient)
    {
        let Some(arrived_at) = parcel.entered_at(ParcelStatus::DeliveredToRecipient) else {
            continue;
        };
        let overdue = (now - arrived_at)
            .to_std()
            .map(|waited| waited >= grace)
            .unwrap_or(false);
        if !overdue {
            continue;
        }

        let payload = TransitionPayload {
            notes: Some(AUTO_CONFIRM_NOTE.to_string()),
            expected_version: Some(parcel.version),
            ..Default::default()
        };

        match apply_transition(state, parcel.id, Action::ConfirmDelivery, SYSTEM_ACTOR, payload)
            .await
        {
            Ok(_) => confirmed += 1,
            Err(err) => {
                warn!(parcel_id = %parcel.id, error = %err, "auto-confirm skipped");
            }
        }
    }

    confirmed
}
