use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::driver::GeoPoint;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ParcelStatus {
    Pending,
    Assigned,
    PickedUp,
    InTransit,
    DeliveredToRecipient,
    Delivered,
    Completed,
    Cancelled,
}

impl ParcelStatus {
    pub const ALL: [ParcelStatus; 8] = [
        ParcelStatus::Pending,
        ParcelStatus::Assigned,
        ParcelStatus::PickedUp,
        ParcelStatus::InTransit,
        ParcelStatus::DeliveredToRecipient,
        ParcelStatus::Delivered,
        ParcelStatus::Completed,
        ParcelStatus::Cancelled,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(self, ParcelStatus::Completed | ParcelStatus::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ParcelStatus::Pending => "pending",
            ParcelStatus::Assigned => "assigned",
            ParcelStatus::PickedUp => "picked_up",
            ParcelStatus::InTransit => "in_transit",
            ParcelStatus::DeliveredToRecipient => "delivered_to_recipient",
            ParcelStatus::Delivered => "delivered",
            ParcelStatus::Completed => "completed",
            ParcelStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ParcelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Party {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub account_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Address {
    pub text: String,
    pub location: Option<GeoPoint>,
    pub canonical: Option<String>,
}

impl Address {
    pub fn unresolved(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            location: None,
            canonical: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Unpaid,
    Paid,
    Refunded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfirmation {
    pub delivered_to_recipient: bool,
    pub confirmed_at: DateTime<Utc>,
    pub confirmed_by: Uuid,
    pub signature: Option<String>,
    pub notes: Option<String>,
    pub auto_confirmed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub status: ParcelStatus,
    pub timestamp: DateTime<Utc>,
    pub actor: Uuid,
    pub notes: Option<String>,
    pub location: Option<GeoPoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parcel {
    pub id: Uuid,
    pub tracking_number: String,
    pub sender: Party,
    pub recipient: Party,
    pub assigned_driver: Option<Uuid>,
    pub pickup: Address,
    pub delivery: Address,
    pub weight_kg: f64,
    pub declared_value: Option<f64>,
    pub instructions: Option<String>,
    pub status: ParcelStatus,
    pub created_at: DateTime<Utc>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub estimated_pickup_time: Option<DateTime<Utc>>,
    pub actual_pickup_time: Option<DateTime<Utc>>,
    pub estimated_delivery_time: Option<DateTime<Utc>>,
    pub actual_delivery_time: Option<DateTime<Utc>>,
    pub delivery_duration_minutes: Option<i64>,
    pub delivery_fee: Option<f64>,
    pub payment_status: PaymentStatus,
    pub delivery_confirmation: Option<DeliveryConfirmation>,
    pub history: Vec<StatusHistoryEntry>,
    pub version: u64,
}

impl Parcel {
    pub fn last_history_entry(&self) -> Option<&StatusHistoryEntry> {
        self.history.last()
    }

    pub fn entered_at(&self, status: ParcelStatus) -> Option<DateTime<Utc>> {
        self.history
            .iter()
            .rev()
            .find(|entry| entry.status == status)
            .map(|entry| entry.timestamp)
    }
}
