use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::haversine_km;
use crate::models::driver::{Driver, GeoPoint, VehicleType};

const DISTANCE_WEIGHT: f64 = 0.60;
const RATING_WEIGHT: f64 = 0.40;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EligibilityCriteria {
    #[serde(default)]
    pub vehicle_type: Option<VehicleType>,
    #[serde(default)]
    pub min_rating: Option<f64>,
    #[serde(default)]
    pub exclude_ids: Vec<Uuid>,
    #[serde(default)]
    pub require_available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub distance_score: f64,
    pub rating_score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedCandidate {
    pub driver: Driver,
    pub distance_km: Option<f64>,
    pub score: f64,
    pub score_breakdown: ScoreBreakdown,
}

pub fn is_eligible(driver: &Driver, criteria: &EligibilityCriteria) -> bool {
    if criteria.require_available && !driver.available {
        return false;
    }
    if criteria.exclude_ids.contains(&driver.id) {
        return false;
    }
    if let Some(vehicle_type) = criteria.vehicle_type {
        if driver.vehicle_type != vehicle_type {
            return false;
        }
    }
    if let Some(min_rating) = criteria.min_rating {
        if driver.rating < min_rating {
            return false;
        }
    }
    true
}

pub fn eligible(drivers: &[Driver], criteria: &EligibilityCriteria) -> Vec<Driver> {
    drivers
        .iter()
        .filter(|driver| is_eligible(driver, criteria))
        .cloned()
        .collect()
}

/// Best first. Drivers or pickups without coordinates get no proximity credit.
pub fn rank_candidates(drivers: Vec<Driver>, pickup: Option<&GeoPoint>) -> Vec<RankedCandidate> {
    let mut ranked: Vec<RankedCandidate> = drivers
        .into_iter()
        .map(|driver| {
            let distance_km = match (driver.location.as_ref(), pickup) {
                (Some(from), Some(to)) => Some(haversine_km(from, to)),
                _ => None,
            };

            let score_breakdown = ScoreBreakdown {
                distance_score: distance_km.map(distance_score).unwrap_or(0.0),
                rating_score: rating_score(driver.rating),
            };

            RankedCandidate {
                score: weighted_score(&score_breakdown),
                driver,
                distance_km,
                score_breakdown,
            }
        })
        .collect();

    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked
}

pub fn weighted_score(breakdown: &ScoreBreakdown) -> f64 {
    (breakdown.distance_score * DISTANCE_WEIGHT) + (breakdown.rating_score * RATING_WEIGHT)
}

fn distance_score(distance_km: f64) -> f64 {
    1.0 / (1.0 + distance_km.max(0.0))
}

fn rating_score(rating: f64) -> f64 {
    (rating / 5.0).clamp(0.0, 1.0)
}
