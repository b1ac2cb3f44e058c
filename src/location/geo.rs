/// Mean Earth radius in meters, as used by the geofencing checks.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two WGS84 points, in meters (haversine).
pub fn haversine_distance_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Whether (`lat`, `lon`) lies within `radius_m` meters of the site center.
pub fn is_within_radius(
    lat: f64,
    lon: f64,
    center_lat: f64,
    center_lon: f64,
    radius_m: f64,
) -> bool {
    haversine_distance_m(lat, lon, center_lat, center_lon) <= radius_m
}
