pub mod eta;

use crate::error::AppError;
use crate::models::driver::GeoPoint;

pub use eta::{RouteEstimate, estimate_eta_minutes, estimate_route};

const EARTH_RADIUS_KM: f64 = 6_371.0;

pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_KM * central_angle
}

/// Great-circle distance rounded to two decimals.
pub fn distance_km(a: &GeoPoint, b: &GeoPoint) -> Result<f64, AppError> {
    validate_point(a)?;
    validate_point(b)?;

    Ok((haversine_km(a, b) * 100.0).round() / 100.0)
}

pub fn validate_point(point: &GeoPoint) -> Result<(), AppError> {
    if point.is_valid() {
        Ok(())
    } else {
        Err(AppError::InvalidCoordinates(format!(
            "({}, {}) is not a valid lat/lng pair",
            point.lat, point.lng
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::{distance_km, haversine_km};
    use crate::error::AppError;
    use crate::models::driver::GeoPoint;

    #[test]
    fn zero_distance_for_same_point() {
        let p = GeoPoint {
            lat: -1.2921,
            lng: 36.8219,
        };
        let distance = haversine_km(&p, &p);
        assert!(distance < 1e-9);
    }

    #[test]
    fn nairobi_to_mombasa_is_around_440_km() {
        let nairobi = GeoPoint::new(-1.2921, 36.8219);
        let mombasa = GeoPoint::new(-4.0435, 39.6682);

        let distance = distance_km(&nairobi, &mombasa).unwrap();
        assert!((distance - 440.0).abs() < 5.0, "got {distance}");
    }

    #[test]
    fn distance_is_rounded_to_two_decimals() {
        let a = GeoPoint::new(-1.2921, 36.8219);
        let b = GeoPoint::new(-1.3000, 36.8000);

        let distance = distance_km(&a, &b).unwrap();
        assert_eq!(distance, (distance * 100.0).round() / 100.0);
    }

    #[test]
    fn distance_is_deterministic() {
        let a = GeoPoint::new(51.5074, -0.1278);
        let b = GeoPoint::new(48.8566, 2.3522);

        assert_eq!(distance_km(&a, &b).unwrap(), distance_km(&a, &b).unwrap());
    }

    #[test]
    fn nan_coordinates_are_rejected() {
        let a = GeoPoint::new(f64::NAN, 36.8);
        let b = GeoPoint::new(-1.3, 36.8);

        assert!(matches!(
            distance_km(&a, &b),
            Err(AppError::InvalidCoordinates(_))
        ));
    }

    #[test]
    fn out_of_range_latitude_is_rejected() {
        let a = GeoPoint::new(91.0, 0.0);
        let b = GeoPoint::new(0.0, 0.0);

        assert!(distance_km(&a, &b).is_err());
    }
}
