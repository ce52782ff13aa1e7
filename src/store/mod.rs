use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::{Mutex, OwnedMutexGuard, watch};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::parcel::{Parcel, ParcelStatus};

struct ParcelSlot {
    gate: Arc<Mutex<()>>,
    committed: watch::Sender<Parcel>,
}

impl ParcelSlot {
    fn new(parcel: Parcel) -> Self {
        Self {
            gate: Arc::new(Mutex::new(())),
            committed: watch::Sender::new(parcel),
        }
    }

    fn snapshot(&self) -> Parcel {
        self.committed.borrow().clone()
    }
}

/// Exclusive write access to one parcel, held until dropped or committed.
pub struct ParcelWriter {
    slot: Arc<ParcelSlot>,
    _gate: OwnedMutexGuard<()>,
}

impl ParcelWriter {
    pub fn current(&self) -> Parcel {
        self.slot.snapshot()
    }

    pub fn commit(self, parcel: Parcel) {
        self.slot.committed.send_replace(parcel);
    }
}

#[derive(Default)]
pub struct ParcelStore {
    parcels: DashMap<Uuid, Arc<ParcelSlot>>,
    tracking_index: DashMap<String, Uuid>,
}

impl ParcelStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// `false` when the tracking number is already taken.
    pub fn try_insert(&self, parcel: Parcel) -> bool {
        match self.tracking_index.entry(parcel.tracking_number.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                vacant.insert(parcel.id);
                self.parcels.insert(parcel.id, Arc::new(ParcelSlot::new(parcel)));
                true
            }
        }
    }

    pub fn get(&self, id: Uuid) -> Option<Parcel> {
        self.parcels.get(&id).map(|entry| entry.value().snapshot())
    }

    pub fn find_by_tracking_number(&self, tracking_number: &str) -> Option<Parcel> {
        let id = *self.tracking_index.get(tracking_number)?.value();
        self.get(id)
    }

    pub fn lock_for_update(&self, id: Uuid) -> Result<ParcelWriter, AppError> {
        let slot = self
            .parcels
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| AppError::NotFound(format!("parcel {id} not found")))?;

        let gate = Arc::clone(&slot.gate)
            .try_lock_owned()
            .map_err(|_| AppError::ConcurrentModification)?;

        Ok(ParcelWriter { slot, _gate: gate })
    }

    pub fn in_status(&self, status: ParcelStatus) -> Vec<Parcel> {
        self.parcels
            .iter()
            .map(|entry| entry.value().snapshot())
            .filter(|parcel| parcel.status == status)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.parcels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parcels.is_empty()
    }
}
