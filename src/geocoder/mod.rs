pub mod cache;
pub mod nominatim;
pub mod provider;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::geocoder::cache::GeocodeCache;
use crate::geocoder::provider::{GeocodeCandidate, GeocodingProvider};
use crate::models::driver::GeoPoint;
use crate::observability::metrics::Metrics;

pub const MIN_ADDRESS_LEN: usize = 3;
pub const MAX_SUGGESTIONS: usize = 10;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum GeocodeError {
    #[error("address must be at least 3 characters, got {0:?}")]
    InvalidAddress(String),

    #[error("invalid coordinates: {0}")]
    InvalidCoordinates(String),

    #[error("lookup timed out after {0:?}")]
    Timeout(Duration),

    #[error("lookup failed: {0}")]
    LookupFailed(String),

    #[error("no result for {0}")]
    NotFound(String),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GeocodeErrorKind {
    InvalidAddress,
    InvalidCoordinates,
    Timeout,
    LookupFailed,
    NotFound,
}

impl GeocodeError {
    pub fn kind(&self) -> GeocodeErrorKind {
        match self {
            GeocodeError::InvalidAddress(_) => GeocodeErrorKind::InvalidAddress,
            GeocodeError::InvalidCoordinates(_) => GeocodeErrorKind::InvalidCoordinates,
            GeocodeError::Timeout(_) => GeocodeErrorKind::Timeout,
            GeocodeError::LookupFailed(_) => GeocodeErrorKind::LookupFailed,
            GeocodeError::NotFound(_) => GeocodeErrorKind::NotFound,
        }
    }

    fn outcome(&self) -> &'static str {
        match self.kind() {
            GeocodeErrorKind::InvalidAddress | GeocodeErrorKind::InvalidCoordinates => "invalid",
            GeocodeErrorKind::Timeout => "timeout",
            GeocodeErrorKind::LookupFailed => "failed",
            GeocodeErrorKind::NotFound => "not_found",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeocodeResult {
    pub location: GeoPoint,
    pub canonical_address: String,
}

/// `approximate` marks the configured default location.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ResolvedLocation {
    pub location: GeoPoint,
    pub canonical_address: String,
    pub approximate: bool,
}

#[derive(Debug, Clone, Serialize, Default, PartialEq)]
pub struct Suggestions {
    pub candidates: Vec<GeocodeCandidate>,
    pub error: Option<GeocodeErrorKind>,
}

#[derive(Debug, Clone)]
pub struct FallbackLocation {
    pub location: GeoPoint,
    pub label: String,
}

impl Default for FallbackLocation {
    fn default() -> Self {
        Self {
            location: GeoPoint::new(-1.2921, 36.8219),
            label: "Nairobi, Kenya".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeocoderSettings {
    pub timeout: Duration,
    pub fallback: FallbackLocation,
}

impl Default for GeocoderSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            fallback: FallbackLocation::default(),
        }
    }
}

type SharedLookup = Shared<BoxFuture<'static, Result<GeocodeResult, GeocodeError>>>;

#[derive(Clone)]
pub struct Geocoder {
    provider: Arc<dyn GeocodingProvider>,
    cache: Arc<GeocodeCache>,
    in_flight: Arc<DashMap<String, SharedLookup>>,
    timeout: Duration,
    fallback: FallbackLocation,
    metrics: Metrics,
}

impl Geocoder {
    pub fn new(
        provider: Arc<dyn GeocodingProvider>,
        settings: GeocoderSettings,
        metrics: Metrics,
    ) -> Self {
        Self {
            provider,
            cache: Arc::new(GeocodeCache::new()),
            in_flight: Arc::new(DashMap::new()),
            timeout: settings.timeout,
            fallback: settings.fallback,
            metrics,
        }
    }

    pub fn cache(&self) -> &GeocodeCache {
        &self.cache
    }

    pub async fn resolve(&self, address: &str) -> Result<GeocodeResult, GeocodeError> {
        let key = normalize_address(address)?;

        if let Some(entry) = self.cache.get(&key) {
            self.metrics.geocode_cache_hits_total.inc();
            debug!(address = %key, "geocode cache hit");
            return entry.into_result();
        }

        let lookup = self
            .in_flight
            .entry(key.clone())
            .or_insert_with(|| {
                let provider = Arc::clone(&self.provider);
                let query = key.clone();
                let timeout = self.timeout;
                async move { lookup_first(provider, query, timeout).await }
                    .boxed()
                    .shared()
            })
            .value()
            .clone();

        let result = lookup.clone().await;

        // Timeouts and transport failures are retried on the next call.
        match &result {
            Ok(resolved) => self.cache.store_resolved(&key, resolved.clone()),
            Err(err @ GeocodeError::NotFound(_)) => self.cache.store_failure(&key, err.clone()),
            Err(_) => {}
        }
        // A newer lookup may have replaced ours after it failed.
        self.in_flight
            .remove_if(&key, |_, current| current.ptr_eq(&lookup));

        self.record("resolve", &result);
        result
    }

    pub async fn resolve_or_fallback(
        &self,
        address: &str,
    ) -> Result<ResolvedLocation, GeocodeError> {
        match self.resolve(address).await {
            Ok(resolved) => Ok(ResolvedLocation {
                location: resolved.location,
                canonical_address: resolved.canonical_address,
                approximate: false,
            }),
            Err(err @ GeocodeError::InvalidAddress(_)) => Err(err),
            Err(err) => {
                warn!(address, error = %err, "geocoding failed; using fallback location");
                Ok(ResolvedLocation {
                    location: self.fallback.location,
                    canonical_address: self.fallback.label.clone(),
                    approximate: true,
                })
            }
        }
    }

    /// Autocomplete candidates. Never fails: provider errors come back as an
    /// empty list with the error kind attached.
    pub async fn suggest(&self, query: &str, limit: usize) -> Suggestions {
        let query = query.trim();
        if query.chars().count() < MIN_ADDRESS_LEN {
            return Suggestions::default();
        }

        let limit = limit.clamp(1, MAX_SUGGESTIONS);
        let result = bounded(self.timeout, self.provider.search(query, limit)).await;

        match result {
            Ok(mut candidates) => {
                self.metrics
                    .geocode_requests_total
                    .with_label_values(&["suggest", "success"])
                    .inc();
                candidates.truncate(limit);
                Suggestions {
                    candidates,
                    error: None,
                }
            }
            Err(err) => {
                self.metrics
                    .geocode_requests_total
                    .with_label_values(&["suggest", err.outcome()])
                    .inc();
                warn!(query, error = %err, "address suggestions unavailable");
                Suggestions {
                    candidates: Vec::new(),
                    error: Some(err.kind()),
                }
            }
        }
    }

    pub async fn reverse_resolve(&self, lat: f64, lng: f64) -> Result<String, GeocodeError> {
        let point = GeoPoint::new(lat, lng);
        if !point.is_valid() {
            return Err(GeocodeError::InvalidCoordinates(format!("({lat}, {lng})")));
        }

        if let Some(address) = self.cache.get_reverse(&point) {
            self.metrics.geocode_cache_hits_total.inc();
            return Ok(address);
        }

        let result = bounded(self.timeout, self.provider.reverse(point))
            .await
            .and_then(|address| {
                address.ok_or_else(|| GeocodeError::NotFound(format!("({lat}, {lng})")))
            });

        if let Ok(address) = &result {
            self.cache.store_reverse(&point, address.clone());
        }

        self.record("reverse", &result);
        result
    }

    fn record<T>(&self, operation: &str, result: &Result<T, GeocodeError>) {
        let outcome = match result {
            Ok(_) => "success",
            Err(err) => err.outcome(),
        };
        self.metrics
            .geocode_requests_total
            .with_label_values(&[operation, outcome])
            .inc();
    }
}

pub fn normalize_address(address: &str) -> Result<String, GeocodeError> {
    let trimmed = address.trim();
    if trimmed.chars().count() < MIN_ADDRESS_LEN {
        return Err(GeocodeError::InvalidAddress(trimmed.to_string()));
    }
    Ok(trimmed.to_string())
}

async fn bounded<T, F>(timeout: Duration, lookup: F) -> Result<T, GeocodeError>
where
    F: Future<Output = Result<T, GeocodeError>>,
{
    match tokio::time::timeout(timeout, lookup).await {
        Ok(result) => result,
        Err(_) => Err(GeocodeError::Timeout(timeout)),
    }
}

async fn lookup_first(
    provider: Arc<dyn GeocodingProvider>,
    query: String,
    timeout: Duration,
) -> Result<GeocodeResult, GeocodeError> {
    let candidates = bounded(timeout, provider.search(&query, 1)).await?;

    candidates
        .into_iter()
        .next()
        .map(|candidate| GeocodeResult {
            location: candidate.location,
            canonical_address: candidate.display_name,
        })
        .ok_or(GeocodeError::NotFound(query))
}
