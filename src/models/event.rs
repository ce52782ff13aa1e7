use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::parcel::ParcelStatus;

/// `from` is `None` for the creation event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub parcel_id: Uuid,
    pub tracking_number: String,
    pub from: Option<ParcelStatus>,
    pub to: ParcelStatus,
    pub action: String,
    pub actor: Uuid,
    pub at: DateTime<Utc>,
}
