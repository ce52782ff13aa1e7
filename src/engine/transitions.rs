use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::parcel::ParcelStatus;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Assign,
    Reassign,
    ConfirmPickup,
    Depart,
    ArriveAtRecipient,
    ConfirmDelivery,
    MarkComplete,
    Cancel,
}

impl Action {
    pub const ALL: [Action; 8] = [
        Action::Assign,
        Action::Reassign,
        Action::ConfirmPickup,
        Action::Depart,
        Action::ArriveAtRecipient,
        Action::ConfirmDelivery,
        Action::MarkComplete,
        Action::Cancel,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Assign => "assign",
            Action::Reassign => "reassign",
            Action::ConfirmPickup => "confirm_pickup",
            Action::Depart => "depart",
            Action::ArriveAtRecipient => "arrive_at_recipient",
            Action::ConfirmDelivery => "confirm_delivery",
            Action::MarkComplete => "mark_complete",
            Action::Cancel => "cancel",
        }
    }

    pub fn needs_driver(self) -> bool {
        matches!(self, Action::Assign | Action::Reassign)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status reached by applying `action` in `from`, or `None` if the pair is
/// not in the table. A reassignment while still pending counts as the first
/// assignment.
pub fn target_status(from: ParcelStatus, action: Action) -> Option<ParcelStatus> {
    use ParcelStatus::*;

    match (from, action) {
        (Pending, Action::Assign) | (Pending | Assigned, Action::Reassign) => Some(Assigned),
        (Assigned, Action::ConfirmPickup) => Some(PickedUp),
        (PickedUp, Action::Depart) => Some(InTransit),
        (InTransit, Action::ArriveAtRecipient) => Some(DeliveredToRecipient),
        (DeliveredToRecipient, Action::ConfirmDelivery) => Some(Delivered),
        (Delivered, Action::MarkComplete) => Some(Completed),
        (Pending | Assigned | PickedUp | InTransit, Action::Cancel) => Some(Cancelled),
        _ => None,
    }
}

pub fn legal_actions(from: ParcelStatus) -> Vec<Action> {
    Action::ALL
        .into_iter()
        .filter(|action| target_status(from, *action).is_some())
        .collect()
}

/// Statuses at which the physical parcel has left the sender, so the
/// driver link is fixed.
pub fn is_past_pickup(status: ParcelStatus) -> bool {
    // Cancelled has no rank and compares below every ranked status.
    let rank = progress_rank(status);
    rank >= progress_rank(ParcelStatus::PickedUp) && rank <= progress_rank(ParcelStatus::Delivered)
}

/// Position along the delivery path. Cancellation sits outside it.
pub fn progress_rank(status: ParcelStatus) -> Option<u8> {
    match status {
        ParcelStatus::Pending => Some(0),
        ParcelStatus::Assigned => Some(1),
        ParcelStatus::PickedUp => Some(2),
        ParcelStatus::InTransit => Some(3),
        ParcelStatus::DeliveredToRecipient => Some(4),
        ParcelStatus::Delivered => Some(5),
        ParcelStatus::Completed => Some(6),
        ParcelStatus::Cancelled => None,
    }
}
