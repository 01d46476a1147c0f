use serde::{Deserialize, Serialize};

/// Metres covered by one degree of latitude (and of longitude at the equator).
pub const METERS_PER_DEGREE_LATITUDE: f64 = 111_320.0;

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn distance_km(&self, other: &Coordinate) -> f64 {
        haversine_distance_km(self.lat, self.lng, other.lat, other.lng)
    }
}

/// Metres per degree of longitude at `latitude`.
///
/// Tends to zero toward the poles; callers dividing by it must accept the
/// resulting blow-up there.
pub fn meters_per_degree_longitude(latitude: f64) -> f64 {
    METERS_PER_DEGREE_LATITUDE * latitude.to_radians().cos()
}

/// Great-circle distance in kilometres between two points given in degrees.
pub fn haversine_distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);

    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}
