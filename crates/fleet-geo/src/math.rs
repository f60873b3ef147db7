use crate::{MAX_LATITUDE, MAX_LONGITUDE, MIN_LATITUDE, MIN_LONGITUDE, Point};
use fleet_core::{EpochMillis, time::MILLIS_PER_MINUTE};
use serde::{Deserialize, Serialize};

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Average urban driving speed used when no speed is known.
pub const DEFAULT_URBAN_SPEED_KMH: f64 = 40.0;

/// Haversine great-circle distance in meters.
pub fn distance(a: Point, b: Point) -> f64 {
    let phi1 = a.lat.to_radians();
    let phi2 = b.lat.to_radians();
    let half_dphi = (b.lat - a.lat).to_radians() / 2.0;
    let half_dlambda = (b.lng - a.lng).to_radians() / 2.0;

    let h = half_dphi.sin().powi(2) + phi1.cos() * phi2.cos() * half_dlambda.sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_M * c
}

/// Planar bearing from `from` to `to` in degrees, `[0, 360)`, 0 pointing north.
///
/// Returns `None` for coincident points, where the bearing is undefined.
pub fn try_heading(from: Point, to: Point) -> Option<f64> {
    let d_lat = to.lat - from.lat;
    let d_lng = to.lng - from.lng;
    if d_lat == 0.0 && d_lng == 0.0 {
        return None;
    }
    let degrees = d_lng.atan2(d_lat).to_degrees();
    Some((degrees + 360.0) % 360.0)
}

/// Like [`try_heading`], but coincident points yield 0.
pub fn heading(from: Point, to: Point) -> f64 {
    try_heading(from, to).unwrap_or(0.0)
}

/// Linear interpolation in lat/lng space. Not geodesic; fine at city scale.
pub fn interpolate(start: Point, end: Point, factor: f64) -> Point {
    let factor = factor.clamp(0.0, 1.0);
    Point {
        lat: start.lat + (end.lat - start.lat) * factor,
        lng: start.lng + (end.lng - start.lng) * factor,
    }
}

pub fn is_valid(point: Point) -> bool {
    point.lat.is_finite()
        && point.lng.is_finite()
        && (MIN_LATITUDE..=MAX_LATITUDE).contains(&point.lat)
        && (MIN_LONGITUDE..=MAX_LONGITUDE).contains(&point.lng)
}

/// Sum of leg distances when visiting `points` in the given order.
pub fn route_length(points: &[Point]) -> f64 {
    points
        .windows(2)
        .map(|leg| distance(leg[0], leg[1]))
        .sum()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Eta {
    pub distance_m: f64,
    pub minutes: u64,
    pub arrival_at_ms: EpochMillis,
}

/// Travel-time estimate at a constant speed, rounded to whole minutes.
pub fn eta(distance_m: f64, speed_kmh: f64, now_ms: EpochMillis) -> Option<Eta> {
    if !distance_m.is_finite() || distance_m < 0.0 || !speed_kmh.is_finite() || speed_kmh <= 0.0
    {
        return None;
    }
    let minutes = ((distance_m / 1000.0) / speed_kmh * 60.0).round() as u64;
    Some(Eta {
        distance_m,
        minutes,
        arrival_at_ms: now_ms.saturating_add(minutes.saturating_mul(MILLIS_PER_MINUTE)),
    })
}
