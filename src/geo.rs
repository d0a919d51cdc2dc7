use crate::report::Coordinates;

/// Mean Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two coordinates in kilometers, using the
/// haversine formula.
///
/// Symmetric, and zero (within floating tolerance) when both points are
/// identical. Inputs are decimal degrees.
pub fn haversine_km(a: Coordinates, b: Coordinates) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().asin();

    EARTH_RADIUS_KM * c
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coords(latitude: f64, longitude: f64) -> Coordinates {
        Coordinates {
            latitude,
            longitude,
        }
    }

    #[test]
    fn test_distance_to_self_is_zero() {
        let p = coords(48.8566, 2.3522);
        assert!(haversine_km(p, p).abs() < 1e-9);
    }

    #[test]
    fn test_distance_is_symmetric() {
        let paris = coords(48.8566, 2.3522);
        let london = coords(51.5074, -0.1278);
        let there = haversine_km(paris, london);
        let back = haversine_km(london, paris);
        assert!((there - back).abs() < 1e-9);
    }

    #[test]
    fn test_known_distance_paris_london() {
        let paris = coords(48.8566, 2.3522);
        let london = coords(51.5074, -0.1278);
        let d = haversine_km(paris, london);
        // Roughly 344 km; allow a couple of km of slack for the spherical model.
        assert!((d - 344.0).abs() < 3.0, "got {}", d);
    }

    #[test]
    fn test_small_equatorial_offset_is_about_one_km() {
        let a = coords(0.0, 0.0);
        let b = coords(0.0, 0.009);
        let d = haversine_km(a, b);
        assert!((d - 1.0).abs() < 0.01, "got {}", d);
    }
}
