use crate::math::distance;
use crate::{Point, Polygon};

/// Even-odd ray casting. Latitude is the x axis and longitude the y axis;
/// the scan line runs along constant longitude.
///
/// Points exactly on an edge may land on either side.
pub fn contains(point: Point, polygon: &Polygon) -> bool {
    let ring = &polygon.vertices;
    if ring.len() < 3 {
        return false;
    }
    if polygon.bounds().is_some_and(|bounds| !bounds.contains(point)) {
        return false;
    }

    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (xi, yi) = (ring[i].lat, ring[i].lng);
        let (xj, yj) = (ring[j].lat, ring[j].lng);

        if (yi > point.lng) != (yj > point.lng)
            && point.lat < (xj - xi) * (point.lng - yi) / (yj - yi) + xi
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Distance in meters from `point` to the closest point of segment `start..end`.
///
/// The projection is done in lat/lng space and the result measured with haversine.
pub fn distance_to_segment(point: Point, start: Point, end: Point) -> f64 {
    let d_lat = end.lat - start.lat;
    let d_lng = end.lng - start.lng;
    let len_sq = d_lat * d_lat + d_lng * d_lng;
    if len_sq == 0.0 {
        return distance(point, start);
    }

    let t = ((point.lat - start.lat) * d_lat + (point.lng - start.lng) * d_lng) / len_sq;
    let closest = if t <= 0.0 {
        start
    } else if t >= 1.0 {
        end
    } else {
        Point {
            lat: start.lat + t * d_lat,
            lng: start.lng + t * d_lng,
        }
    };
    distance(point, closest)
}

/// Zero when the polygon contains `point`, otherwise the minimum distance to any edge.
pub fn distance_to_boundary(point: Point, polygon: &Polygon) -> f64 {
    if contains(point, polygon) {
        return 0.0;
    }
    edges(polygon)
        .map(|(start, end)| distance_to_segment(point, start, end))
        .fold(f64::INFINITY, f64::min)
}

/// Consecutive vertex pairs, including the closing edge back to the first vertex.
fn edges(polygon: &Polygon) -> impl Iterator<Item = (Point, Point)> + '_ {
    let ring = &polygon.vertices;
    ring.iter()
        .enumerate()
        .map(move |(i, start)| (*start, ring[(i + 1) % ring.len()]))
}
