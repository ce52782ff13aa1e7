use serde::Serialize;

use crate::error::AppError;
use crate::geo::distance_km;
use crate::models::driver::GeoPoint;

pub const HANDLING_BUFFER_MINUTES: u32 = 10;

struct Band {
    upper_km: f64,
    minutes_per_km: f64,
    floor_minutes: u32,
}

static BANDS: [Band; 4] = [
    Band {
        upper_km: 5.0,
        minutes_per_km: 4.0,
        floor_minutes: 15,
    },
    Band {
        upper_km: 15.0,
        minutes_per_km: 3.0,
        floor_minutes: 30,
    },
    Band {
        upper_km: 50.0,
        minutes_per_km: 2.5,
        floor_minutes: 60,
    },
    Band {
        upper_km: f64::INFINITY,
        minutes_per_km: 2.0,
        floor_minutes: 180,
    },
];

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct RouteEstimate {
    pub distance_km: f64,
    pub eta_minutes: u32,
}

pub fn estimate_eta_minutes(distance_km: f64) -> u32 {
    // f64::max maps NaN to 0.0 as well
    let distance = distance_km.max(0.0);

    let band = BANDS
        .iter()
        .find(|band| distance <= band.upper_km)
        .unwrap_or(&BANDS[BANDS.len() - 1]);

    let travel = (distance * band.minutes_per_km).round() as u32;
    travel.max(band.floor_minutes) + HANDLING_BUFFER_MINUTES
}

pub fn estimate_route(from: &GeoPoint, to: &GeoPoint) -> Result<RouteEstimate, AppError> {
    let distance_km = distance_km(from, to)?;

    Ok(RouteEstimate {
        distance_km,
        eta_minutes: estimate_eta_minutes(distance_km),
    })
}

#[cfg(test)]
mod tests {
    use super::{estimate_eta_minutes, estimate_route};
    use crate::models::driver::GeoPoint;

    #[test]
    fn short_trips_hit_the_floor() {
        assert_eq!(estimate_eta_minutes(0.0), 25);
        assert_eq!(estimate_eta_minutes(2.0), 25);
    }

    #[test]
    fn band_boundaries_use_the_lower_band() {
        // 5 km: 5 * 4 = 20, above the 15 minute floor
        assert_eq!(estimate_eta_minutes(5.0), 30);
        // 15 km: 15 * 3 = 45
        assert_eq!(estimate_eta_minutes(15.0), 55);
        // 50 km: 50 * 2.5 = 125
        assert_eq!(estimate_eta_minutes(50.0), 135);
    }

    #[test]
    fn just_past_a_boundary_switches_band() {
        // 5.01 km lands in the second band and its 30 minute floor
        assert_eq!(estimate_eta_minutes(5.01), 40);
        // 50.5 km: round(101) under the 180 floor
        assert_eq!(estimate_eta_minutes(50.5), 190);
    }

    #[test]
    fn mid_band_values_round() {
        assert_eq!(estimate_eta_minutes(12.3), 47);
        assert_eq!(estimate_eta_minutes(30.0), 85);
        assert_eq!(estimate_eta_minutes(120.0), 250);
    }

    #[test]
    fn negative_and_nan_distances_are_treated_as_zero() {
        assert_eq!(estimate_eta_minutes(-3.0), 25);
        assert_eq!(estimate_eta_minutes(f64::NAN), 25);
    }

    #[test]
    fn nairobi_to_mombasa_uses_the_long_haul_band() {
        let nairobi = GeoPoint::new(-1.2921, 36.8219);
        let mombasa = GeoPoint::new(-4.0435, 39.6682);

        let estimate = estimate_route(&nairobi, &mombasa).unwrap();

        assert!((estimate.distance_km - 440.0).abs() < 5.0);
        let expected = (estimate.distance_km * 2.0).round() as u32 + 10;
        assert_eq!(estimate.eta_minutes, expected);
        assert!(estimate.eta_minutes > 190);
    }
}
