use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::geocoder::{GeocodeError, GeocodeResult};
use crate::models::driver::GeoPoint;

const REVERSE_KEY_SCALE: f64 = 100_000.0;

#[derive(Debug, Clone)]
pub enum CacheEntry {
    Resolved(GeocodeResult),
    Failed(GeocodeError),
}

impl CacheEntry {
    pub fn into_result(self) -> Result<GeocodeResult, GeocodeError> {
        match self {
            CacheEntry::Resolved(result) => Ok(result),
            CacheEntry::Failed(err) => Err(err),
        }
    }
}

#[derive(Default)]
pub struct GeocodeCache {
    forward: DashMap<String, CacheEntry>,
    reverse: DashMap<(i64, i64), String>,
}

impl GeocodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        self.forward.get(key).map(|entry| entry.value().clone())
    }

    pub fn store_resolved(&self, key: &str, result: GeocodeResult) {
        self.forward
            .insert(key.to_string(), CacheEntry::Resolved(result));
    }

    pub fn store_failure(&self, key: &str, err: GeocodeError) {
        match self.forward.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if matches!(occupied.get(), CacheEntry::Failed(_)) {
                    occupied.insert(CacheEntry::Failed(err));
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(CacheEntry::Failed(err));
            }
        }
    }

    pub fn get_reverse(&self, point: &GeoPoint) -> Option<String> {
        self.reverse
            .get(&reverse_key(point))
            .map(|entry| entry.value().clone())
    }

    pub fn store_reverse(&self, point: &GeoPoint, address: String) {
        self.reverse.insert(reverse_key(point), address);
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}

fn reverse_key(point: &GeoPoint) -> (i64, i64) {
    (
        (point.lat * REVERSE_KEY_SCALE).round() as i64,
        (point.lng * REVERSE_KEY_SCALE).round() as i64,
    )
}
