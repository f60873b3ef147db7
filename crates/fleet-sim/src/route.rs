use crate::SimulationError;
use fleet_geo::{Point, is_valid, route_length};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePoint {
    pub coordinates: Point,
    pub sequence_index: usize,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub id: String,
    pub name: String,
    pub points: Vec<RoutePoint>,
}

impl Route {
    /// Builds a route from `(lat, lng, label)` stops, numbering them in order.
    pub fn from_stops<S: Into<String>>(
        id: impl Into<String>,
        name: impl Into<String>,
        stops: impl IntoIterator<Item = (f64, f64, S)>,
    ) -> Self {
        let points = stops
            .into_iter()
            .enumerate()
            .map(|(sequence_index, (lat, lng, label))| RoutePoint {
                coordinates: Point::new_unchecked(lat, lng),
                sequence_index,
                label: label.into(),
            })
            .collect();
        Self {
            id: id.into(),
            name: name.into(),
            points,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn coordinates(&self) -> Vec<Point> {
        self.points.iter().map(|point| point.coordinates).collect()
    }

    /// Straight-line length of one pass, without the jump back to the start.
    pub fn total_distance_m(&self) -> f64 {
        route_length(&self.coordinates())
    }

    pub(crate) fn validate(&self) -> Result<(), SimulationError> {
        if self.points.len() < 2 {
            return Err(SimulationError::InvalidRoute(format!(
                "route {} needs at least 2 points, has {}",
                self.id,
                self.points.len()
            )));
        }
        if let Some(bad) = self.points.iter().find(|p| !is_valid(p.coordinates)) {
            return Err(SimulationError::InvalidRoute(format!(
                "route {} has invalid point {} ({}, {})",
                self.id, bad.sequence_index, bad.coordinates.lat, bad.coordinates.lng
            )));
        }
        Ok(())
    }
}
