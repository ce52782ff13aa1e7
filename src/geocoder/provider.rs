use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::geocoder::GeocodeError;
use crate::models::driver::GeoPoint;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeocodeCandidate {
    pub location: GeoPoint,
    pub display_name: String,
    pub importance: Option<f64>,
}

#[async_trait]
pub trait GeocodingProvider: Send + Sync {
    /// Ranked matches for a free-text query, best first.
    async fn search(&self, query: &str, limit: usize)
    -> Result<Vec<GeocodeCandidate>, GeocodeError>;

    /// Address text for a point, or `None` when the provider has nothing there.
    async fn reverse(&self, point: GeoPoint) -> Result<Option<String>, GeocodeError>;
}
