use farmcred_types::Coordinates;

pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two points in kilometres.
pub fn haversine_km(a: Coordinates, b: Coordinates) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos()
            * b.latitude.to_radians().cos()
            * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_point_is_zero() {
        let p = Coordinates::new(6.5244, 3.3792);
        assert!(haversine_km(p, p).abs() < 1e-9);
    }

    #[test]
    fn test_lagos_to_abuja() {
        let lagos = Coordinates::new(6.5244, 3.3792);
        let abuja = Coordinates::new(9.0765, 7.3986);
        let d = haversine_km(lagos, abuja);
        assert!((d - 525.9).abs() < 1.0, "got {d}");
        assert!((haversine_km(abuja, lagos) - d).abs() < 1e-9);
    }

    #[test]
    fn test_one_degree_of_latitude() {
        let d = haversine_km(Coordinates::new(0.0, 0.0), Coordinates::new(1.0, 0.0));
        assert!((d - 111.19).abs() < 0.1, "got {d}");
    }
}
