//! Great-circle distance
//!
//! Every distance the engine ranks by or stores in a cursor comes from
//! [`haversine_km`]. The SQL pushdown expression in [`crate::query::sql`] is
//! generated from the same [`EARTH_RADIUS_KM`] and the same clamped-acos shape,
//! so a cursor distance computed here compares equal to the value the store
//! ordered by.

use serde::{Deserialize, Serialize};

use crate::types::Point;

/// Mean Earth radius used by the spherical model
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Kilometres per degree of latitude, used for coarse bounding boxes
pub const KM_PER_DEGREE: f64 = 111.0;

/// Haversine (spherical law of cosines form) distance in kilometres.
///
/// `d = R * acos(sin(lat_a) * sin(lat_b) + cos(lat_a) * cos(lat_b) * cos(lng_b - lng_a))`
///
/// The acos argument is clamped to `[-1, 1]`; identical points return exactly `0.0`.
pub fn haversine_km(a: &Point, b: &Point) -> f64 {
    if a.latitude == b.latitude && a.longitude == b.longitude {
        return 0.0;
    }

    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    // cos is even; taking the absolute delta keeps the result symmetric
    let delta_lng = (b.longitude.to_radians() - a.longitude.to_radians()).abs();

    let cosine = lat_a.sin() * lat_b.sin() + lat_a.cos() * lat_b.cos() * delta_lng.cos();

    EARTH_RADIUS_KM * cosine.clamp(-1.0, 1.0).acos()
}

/// Coarse lat/lng range enclosing a circle of `radius_km` around `center`.
///
/// Used as the range pre-filter of a radius search; the exact cut is done on
/// [`haversine_km`]. The box never excludes a point inside the circle:
///
/// - a circle reaching a pole covers every longitude
/// - a circle crossing the antimeridian wraps, so the longitude range is
///   `[min_lng, 180] ∪ [-180, max_lng]` and `min_lng > max_lng`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    pub fn around(center: &Point, radius_km: f64) -> Self {
        // 111 km/degree is slightly short of the real arc, so the box errs wide
        let lat_delta = radius_km / KM_PER_DEGREE;
        let min_lat = center.latitude - lat_delta;
        let max_lat = center.latitude + lat_delta;

        if min_lat <= -90.0 || max_lat >= 90.0 {
            return Self {
                min_lat: min_lat.max(-90.0),
                max_lat: max_lat.min(90.0),
                min_lng: -180.0,
                max_lng: 180.0,
            };
        }

        // Widest longitude spread of a spherical cap, reached off the centre row
        let angular = lat_delta.to_radians();
        let ratio = angular.sin() / center.latitude.to_radians().cos();
        let lng_delta = if ratio >= 1.0 {
            180.0
        } else {
            ratio.asin().to_degrees()
        };

        if lng_delta >= 180.0 {
            return Self {
                min_lat,
                max_lat,
                min_lng: -180.0,
                max_lng: 180.0,
            };
        }

        let mut min_lng = center.longitude - lng_delta;
        let mut max_lng = center.longitude + lng_delta;
        if min_lng < -180.0 {
            min_lng += 360.0;
        }
        if max_lng > 180.0 {
            max_lng -= 360.0;
        }

        Self {
            min_lat,
            max_lat,
            min_lng,
            max_lng,
        }
    }

    /// True when the longitude range crosses the antimeridian
    pub fn wraps(&self) -> bool {
        self.min_lng > self.max_lng
    }

    pub fn contains(&self, point: &Point) -> bool {
        if point.latitude < self.min_lat || point.latitude > self.max_lat {
            return false;
        }
        if self.wraps() {
            point.longitude >= self.min_lng || point.longitude <= self.max_lng
        } else {
            point.longitude >= self.min_lng && point.longitude <= self.max_lng
        }
    }
}

/// Distance as shown to end users: whole metres under 1 km, else km with two decimals
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "unit", content = "value")]
pub enum DistanceLabel {
    #[serde(rename = "m")]
    Meters(u64),
    #[serde(rename = "km")]
    Kilometers(f64),
}

impl DistanceLabel {
    pub fn from_km(km: f64) -> Self {
        let meters = km * 1000.0;
        if meters < 1000.0 {
            DistanceLabel::Meters(meters.round().max(0.0) as u64)
        } else {
            DistanceLabel::Kilometers((km * 100.0).round() / 100.0)
        }
    }
}

impl std::fmt::Display for DistanceLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DistanceLabel::Meters(m) => write!(f, "{}m", m),
            DistanceLabel::Kilometers(km) => write!(f, "{}km", km),
        }
    }
}
