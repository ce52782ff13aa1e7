use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::geocoder::provider::GeocodingProvider;
use crate::geocoder::{Geocoder, GeocoderSettings};
use crate::models::driver::Driver;
use crate::models::event::TransitionEvent;
use crate::observability::metrics::Metrics;
use crate::store::ParcelStore;

pub struct AppState {
    pub drivers: DashMap<Uuid, Driver>,
    pub parcels: ParcelStore,
    pub geocoder: Geocoder,
    pub transition_events_tx: broadcast::Sender<TransitionEvent>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(
        event_buffer_size: usize,
        provider: Arc<dyn GeocodingProvider>,
        geocoder_settings: GeocoderSettings,
    ) -> Self {
        let metrics = Metrics::new();
        let (transition_events_tx, _unused_rx) = broadcast::channel(event_buffer_size);

        Self {
            drivers: DashMap::new(),
            parcels: ParcelStore::new(),
            geocoder: Geocoder::new(provider, geocoder_settings, metrics.clone()),
            transition_events_tx,
            metrics,
        }
    }

    pub fn roster(&self) -> Vec<Driver> {
        self.drivers
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }
}
