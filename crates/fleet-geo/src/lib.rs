pub mod math;
pub mod polygon;

use fleet_core::{FleetError, FleetResult, OrderId, PolygonId};
use serde::{Deserialize, Serialize};

pub use math::{distance, eta, heading, interpolate, is_valid, route_length, try_heading, Eta};
pub use polygon::{contains, distance_to_boundary, distance_to_segment};

pub const MIN_LATITUDE: f64 = -90.0;
pub const MAX_LATITUDE: f64 = 90.0;
pub const MIN_LONGITUDE: f64 = -180.0;
pub const MAX_LONGITUDE: f64 = 180.0;

/// A WGS84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub lat: f64,
    pub lng: f64,
}

impl Point {
    /// Builds a point, rejecting out-of-range or non-finite coordinates.
    pub fn new(lat: f64, lng: f64) -> FleetResult<Self> {
        let point = Self { lat, lng };
        if is_valid(point) {
            Ok(point)
        } else {
            Err(FleetError::invalid_coordinate(lat, lng))
        }
    }

    pub const fn new_unchecked(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn validate(self) -> FleetResult<Self> {
        Self::new(self.lat, self.lng)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl BoundingBox {
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        let seed = Self {
            north: first.lat,
            south: first.lat,
            east: first.lng,
            west: first.lng,
        };
        Some(points.fold(seed, |bounds, point| Self {
            north: bounds.north.max(point.lat),
            south: bounds.south.min(point.lat),
            east: bounds.east.max(point.lng),
            west: bounds.west.min(point.lng),
        }))
    }

    pub fn contains(&self, point: Point) -> bool {
        point.lat <= self.north
            && point.lat >= self.south
            && point.lng <= self.east
            && point.lng >= self.west
    }
}

/// A coverage zone. The vertex ring is implicitly closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub id: PolygonId,
    pub name: String,
    #[serde(alias = "coordinates")]
    pub vertices: Vec<Point>,
}

impl Polygon {
    pub fn new(id: impl Into<PolygonId>, name: impl Into<String>, vertices: Vec<Point>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            vertices,
        }
    }

    /// At least three vertices, all of them valid points.
    pub fn is_well_formed(&self) -> bool {
        self.vertices.len() >= 3 && self.vertices.iter().all(|vertex| is_valid(*vertex))
    }

    pub fn bounds(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(&self.vertices)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeofenceState {
    Pending,
    Completed,
}

impl Default for GeofenceState {
    fn default() -> Self {
        Self::Pending
    }
}

/// Circular delivery zone around one order's drop-off point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geofence {
    pub order_id: OrderId,
    pub center: Point,
    pub radius_m: f64,
    #[serde(default)]
    pub state: GeofenceState,
}

impl Geofence {
    pub fn pending(order_id: impl Into<OrderId>, center: Point, radius_m: f64) -> Self {
        Self {
            order_id: order_id.into(),
            center,
            radius_m,
            state: GeofenceState::Pending,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state == GeofenceState::Pending
    }

    /// Moves the fence to `Completed`. Returns false if it already was.
    pub fn complete(&mut self) -> bool {
        if self.state == GeofenceState::Completed {
            return false;
        }
        self.state = GeofenceState::Completed;
        true
    }
}
