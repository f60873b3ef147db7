//! Point-versus-coverage-zone resolution.
//!
//! [`resolve`] is a pure function over a caller-supplied polygon slice;
//! [`CoverageService`] loads the slice from a [`PolygonRepository`] first.

use fleet_core::FleetResult;
use fleet_geo::{Point, Polygon, contains, distance_to_boundary};
use fleet_storage::PolygonRepository;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolygonDistance {
    pub polygon: Polygon,
    pub distance_m: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Verdict {
    /// The point lies in at least one zone. `primary` is the first in input order.
    Inside {
        primary: Polygon,
        all_containing: Vec<Polygon>,
    },
    /// No zone contains the point; distances are sorted ascending.
    Outside {
        nearest: Polygon,
        distance_m: f64,
        all_distances: Vec<PolygonDistance>,
    },
    NoPolygons,
}

impl Verdict {
    pub fn status(&self) -> &'static str {
        match self {
            Self::Inside { .. } => "inside",
            Self::Outside { .. } => "outside",
            Self::NoPolygons => "no_polygons",
        }
    }

    pub fn distance_m(&self) -> Option<f64> {
        match self {
            Self::Inside { .. } => Some(0.0),
            Self::Outside { distance_m, .. } => Some(*distance_m),
            Self::NoPolygons => None,
        }
    }

    pub fn matched(&self) -> Option<&Polygon> {
        match self {
            Self::Inside { primary, .. } => Some(primary),
            Self::Outside { nearest, .. } => Some(nearest),
            Self::NoPolygons => None,
        }
    }
}

/// Classifies `point` against `polygons`.
///
/// Malformed polygons are skipped. An invalid `point` fails the whole call.
pub fn resolve(point: Point, polygons: &[Polygon]) -> FleetResult<Verdict> {
    let point = point.validate()?;

    let mut containing = Vec::new();
    let mut distances = Vec::new();
    for polygon in polygons {
        if !polygon.is_well_formed() {
            debug!(
                polygon_id = %polygon.id,
                vertices = polygon.vertices.len(),
                "skipping malformed polygon"
            );
            continue;
        }
        if contains(point, polygon) {
            containing.push(polygon.clone());
        } else {
            distances.push(PolygonDistance {
                polygon: polygon.clone(),
                distance_m: distance_to_boundary(point, polygon),
            });
        }
    }

    let verdict = if let Some(primary) = containing.first().cloned() {
        Verdict::Inside {
            primary,
            all_containing: containing,
        }
    } else if distances.is_empty() {
        Verdict::NoPolygons
    } else {
        // Stable sort, so equal distances keep input order.
        distances.sort_by(|a, b| a.distance_m.total_cmp(&b.distance_m));
        let closest = &distances[0];
        Verdict::Outside {
            nearest: closest.polygon.clone(),
            distance_m: closest.distance_m,
            all_distances: distances,
        }
    };

    metrics::counter!("fleet_coverage_resolutions_total", "status" => verdict.status())
        .increment(1);
    Ok(verdict)
}

/// Resolves points against whatever the injected store currently holds.
pub struct CoverageService<R> {
    store: Arc<R>,
}

impl<R> Clone for CoverageService<R> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<R: PolygonRepository> CoverageService<R> {
    pub fn new(store: Arc<R>) -> Self {
        Self { store }
    }

    pub async fn resolve_point(&self, point: Point) -> FleetResult<Verdict> {
        // Reject bad input before touching the store.
        let point = point.validate()?;
        let polygons = self.store.list().await?;
        resolve(point, &polygons)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_core::ErrorCode;
    use fleet_geo::distance;
    use fleet_storage::{MemoryPolygonStore, PolygonRepository};

    fn rect(id: &str, south: f64, west: f64, north: f64, east: f64) -> Polygon {
        Polygon::new(
            id,
            id,
            vec![
                Point::new_unchecked(south, west),
                Point::new_unchecked(south, east),
                Point::new_unchecked(north, east),
                Point::new_unchecked(north, west),
            ],
        )
    }

    fn ids(polygons: &[Polygon]) -> Vec<&str> {
        polygons.iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn square_scenario_inside_and_outside() {
        let square = rect("square", 0.0, 0.0, 2.0, 2.0);

        let inside = resolve(Point::new_unchecked(1.0, 1.0), &[square.clone()]).unwrap();
        assert_eq!(inside.status(), "inside");
        assert_eq!(inside.distance_m(), Some(0.0));

        let query = Point::new_unchecked(3.0, 1.0);
        let outside = resolve(query, &[square]).unwrap();
        let Verdict::Outside { nearest, distance_m, all_distances } = outside else {
            panic!("expected outside verdict");
        };
        assert_eq!(nearest.id.as_str(), "square");
        assert_eq!(all_distances.len(), 1);
        let expected = distance(query, Point::new_unchecked(2.0, 1.0));
        assert!((distance_m - expected).abs() < 1e-9);
    }

    #[test]
    fn primary_follows_input_order_among_overlapping_zones() {
        let big = rect("big", 0.0, 0.0, 4.0, 4.0);
        let small = rect("small", 1.0, 1.0, 3.0, 3.0);
        let point = Point::new_unchecked(2.0, 2.0);

        let forward = resolve(point, &[big.clone(), small.clone()]).unwrap();
        let backward = resolve(point, &[small, big]).unwrap();

        let (
            Verdict::Inside { primary: p1, all_containing: all1 },
            Verdict::Inside { primary: p2, all_containing: all2 },
        ) = (forward, backward)
        else {
            panic!("expected inside verdicts");
        };
        assert_eq!(p1.id.as_str(), "big");
        assert_eq!(p2.id.as_str(), "small");
        assert_eq!(ids(&all1), ["big", "small"]);
        assert_eq!(ids(&all2), ["small", "big"]);
    }

    #[test]
    fn outside_distances_are_sorted_and_ties_keep_input_order() {
        // Mirror images around the query point's meridian are equidistant.
        let east = rect("east", -1.0, 1.0, 1.0, 2.0);
        let west = rect("west", -1.0, -2.0, 1.0, -1.0);
        let far = rect("far", 10.0, 10.0, 11.0, 11.0);
        let point = Point::new_unchecked(0.0, 0.0);

        let Verdict::Outside { nearest, all_distances, .. } =
            resolve(point, &[far, west, east]).unwrap()
        else {
            panic!("expected outside verdict");
        };
        assert_eq!(nearest.id.as_str(), "west");
        let order: Vec<&str> = all_distances.iter().map(|d| d.polygon.id.as_str()).collect();
        assert_eq!(order, ["west", "east", "far"]);
        assert!(all_distances
            .windows(2)
            .all(|pair| pair[0].distance_m <= pair[1].distance_m));
    }

    #[test]
    fn malformed_polygons_are_skipped() {
        let line = Polygon::new(
            "line",
            "line",
            vec![Point::new_unchecked(0.0, 0.0), Point::new_unchecked(1.0, 1.0)],
        );
        let mut corrupt = rect("corrupt", 0.0, 0.0, 2.0, 2.0);
        corrupt.vertices[2] = Point::new_unchecked(f64::NAN, 2.0);
        let point = Point::new_unchecked(1.0, 1.0);

        assert_eq!(
            resolve(point, &[line.clone(), corrupt.clone()]).unwrap(),
            Verdict::NoPolygons
        );

        let good = rect("good", 5.0, 5.0, 6.0, 6.0);
        let verdict = resolve(point, &[line, corrupt, good]).unwrap();
        assert_eq!(verdict.matched().map(|p| p.id.as_str()), Some("good"));
    }

    #[test]
    fn empty_collection_yields_no_polygons() {
        let verdict = resolve(Point::new_unchecked(0.0, 0.0), &[]).unwrap();
        assert_eq!(verdict, Verdict::NoPolygons);
        assert_eq!(verdict.distance_m(), None);
    }

    #[test]
    fn invalid_point_fails_the_call() {
        let err = resolve(Point::new_unchecked(95.0, 0.0), &[rect("a", 0.0, 0.0, 1.0, 1.0)])
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidCoordinate);
    }

    #[test]
    fn resolution_is_repeatable() {
        let polygons = [
            rect("a", 0.0, 0.0, 1.0, 1.0),
            rect("b", 3.0, 3.0, 4.0, 5.0),
        ];
        let point = Point::new_unchecked(2.0, 2.0);
        let first = resolve(point, &polygons).unwrap();
        let second = resolve(point, &polygons).unwrap();
        assert_eq!(first, second);
        let (Some(d1), Some(d2)) = (first.distance_m(), second.distance_m()) else {
            panic!("expected distances");
        };
        assert_eq!(d1.to_bits(), d2.to_bits());
    }

    #[test]
    fn verdict_serializes_with_status_tag() {
        let verdict = resolve(Point::new_unchecked(0.0, 0.0), &[]).unwrap();
        let json = serde_json::to_value(&verdict).unwrap();
        assert_eq!(json["status"], "no_polygons");
    }

    #[tokio::test]
    async fn service_reads_polygons_from_the_store() {
        let store = Arc::new(MemoryPolygonStore::new());
        for zone in [
            rect("north", 10.0, 0.0, 12.0, 2.0),
            rect("home", 0.0, 0.0, 2.0, 2.0),
        ] {
            store.upsert(zone).await.unwrap();
        }
        let service = CoverageService::new(Arc::clone(&store));

        let verdict = service
            .resolve_point(Point::new_unchecked(1.0, 1.0))
            .await
            .unwrap();
        assert_eq!(verdict.matched().map(|p| p.id.as_str()), Some("home"));

        let err = service
            .resolve_point(Point::new_unchecked(0.0, 200.0))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidCoordinate);
    }
}
