use crate::{Route, RoutePoint, SimulationError};
use fleet_core::{ActorId, EpochMillis, RunId};
use fleet_geo::{Point, distance, interpolate, try_heading};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const KMH_TO_MPS: f64 = 3.6;

/// What a single tick produced, before it is attributed to an actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TickOutcome {
    /// The actor reached `point` and now sits at the start of the next segment.
    /// `route_restarted` is set when `point` was the last stop and the actor
    /// jumped back to the first one.
    WaypointReached {
        index: usize,
        point: RoutePoint,
        route_restarted: bool,
    },
    Motion {
        position: Point,
        heading: f64,
        speed_kmh: f64,
        factor: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationEvent {
    pub actor_id: ActorId,
    pub run_id: RunId,
    pub timestamp_ms: EpochMillis,
    #[serde(flatten)]
    pub outcome: TickOutcome,
}

impl SimulationEvent {
    pub fn is_waypoint(&self) -> bool {
        matches!(self.outcome, TickOutcome::WaypointReached { .. })
    }
}

/// Progress of one actor along its route.
///
/// `current_segment_index` always points at a segment start, so it stays in
/// `0..=len - 2`.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationState {
    route: Arc<Route>,
    current_segment_index: usize,
    progress_m: f64,
    speed_kmh: f64,
    heading: f64,
}

impl SimulationState {
    pub fn new(route: Arc<Route>, speed_kmh: f64) -> Result<Self, SimulationError> {
        route.validate()?;
        if !speed_kmh.is_finite() || speed_kmh <= 0.0 {
            return Err(SimulationError::InvalidSpeed(speed_kmh));
        }
        let heading = initial_heading(&route);
        Ok(Self {
            route,
            current_segment_index: 0,
            progress_m: 0.0,
            speed_kmh,
            heading,
        })
    }

    pub fn current_segment_index(&self) -> usize {
        self.current_segment_index
    }

    pub fn progress_m(&self) -> f64 {
        self.progress_m
    }

    pub fn heading(&self) -> f64 {
        self.heading
    }

    /// Moves the actor forward by `elapsed_s` seconds of travel.
    ///
    /// Overshoot past a waypoint is dropped: the actor stops exactly on the
    /// waypoint and starts the next segment from zero progress.
    pub fn advance(&mut self, elapsed_s: f64) -> TickOutcome {
        let elapsed_s = if elapsed_s.is_finite() && elapsed_s > 0.0 {
            elapsed_s
        } else {
            0.0
        };
        let index = self.current_segment_index;
        let start = self.route.points[index].coordinates;
        let end = self.route.points[index + 1].coordinates;

        self.progress_m += self.speed_kmh / KMH_TO_MPS * elapsed_s;
        let segment_m = distance(start, end);

        if self.progress_m >= segment_m {
            let reached = index + 1;
            let route_restarted = reached == self.route.points.len() - 1;
            self.current_segment_index = if route_restarted { 0 } else { reached };
            self.progress_m = 0.0;
            return TickOutcome::WaypointReached {
                index: reached,
                point: self.route.points[reached].clone(),
                route_restarted,
            };
        }

        // progress_m < segment_m here, so the segment has positive length.
        let factor = self.progress_m / segment_m;
        if let Some(heading) = try_heading(start, end) {
            self.heading = heading;
        }
        TickOutcome::Motion {
            position: interpolate(start, end, factor),
            heading: self.heading,
            speed_kmh: self.speed_kmh,
            factor,
        }
    }
}

fn initial_heading(route: &Route) -> f64 {
    route
        .points
        .windows(2)
        .find_map(|pair| try_heading(pair[0].coordinates, pair[1].coordinates))
        .unwrap_or(0.0)
}
