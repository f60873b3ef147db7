use fleet_core::{ActorId, FleetResult, OrderId, ShipmentId};
use fleet_coverage::{CoverageService, Verdict};
use fleet_geo::math::DEFAULT_URBAN_SPEED_KMH;
use fleet_geo::{Eta, eta};
use fleet_geofence::{DeliveryStop, GeofenceTracker, ProximityAction, ProximityResult};
use fleet_sim::{Route, SimulationEvent, TickOutcome};
use fleet_storage::{
    LastKnownLocation, LocationRepository, MemoryGeofenceStore, MemoryLocationStore,
    MemoryPolygonStore,
};
use std::collections::HashMap;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

/// What the worker concluded from one motion update.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionReport {
    pub proximity: ProximityResult,
    pub coverage: Verdict,
    pub completed: Option<OrderId>,
    /// Time to the nearest pending stop at city speed. `None` once the stop
    /// was just completed or when nothing is pending.
    pub eta: Option<Eta>,
}

/// Joins simulator output with geofence and coverage lookups.
pub struct Pipeline {
    coverage: CoverageService<MemoryPolygonStore>,
    geofences: GeofenceTracker<MemoryGeofenceStore>,
    shipments: HashMap<ActorId, ShipmentId>,
    locations: MemoryLocationStore,
}

impl Pipeline {
    pub fn new(
        coverage: CoverageService<MemoryPolygonStore>,
        geofences: GeofenceTracker<MemoryGeofenceStore>,
    ) -> Self {
        Self {
            coverage,
            geofences,
            shipments: HashMap::new(),
            locations: MemoryLocationStore::new(),
        }
    }

    /// Last fix of every actor that has moved, ordered by actor id.
    pub async fn live_tracking(&self) -> FleetResult<Vec<(ActorId, LastKnownLocation)>> {
        Ok(self.locations.list().await?)
    }

    /// Fences every stop of `route` under shipment `route-<id>` and ties the
    /// shipment to `actor_id`.
    pub async fn assign_route(&mut self, actor_id: ActorId, route: &Route) -> FleetResult<ShipmentId> {
        let shipment_id = ShipmentId::new(format!("route-{}", route.id));
        let stops = route.points.iter().map(|point| DeliveryStop {
            order_id: OrderId::new(format!("route-{}-stop-{}", route.id, point.sequence_index)),
            center: point.coordinates,
            radius_m: None,
        });
        self.geofences.register(shipment_id.clone(), stops).await?;
        self.shipments.insert(actor_id, shipment_id.clone());
        Ok(shipment_id)
    }

    pub async fn handle(&self, event: &SimulationEvent) -> FleetResult<Option<MotionReport>> {
        match &event.outcome {
            TickOutcome::WaypointReached {
                index,
                point,
                route_restarted,
            } => {
                info!(
                    actor_id = %event.actor_id,
                    index,
                    label = %point.label,
                    route_restarted,
                    "waypoint reached"
                );
                Ok(None)
            }
            TickOutcome::Motion {
                position,
                heading,
                speed_kmh,
                ..
            } => {
                self.locations
                    .record(
                        event.actor_id.clone(),
                        LastKnownLocation {
                            position: *position,
                            heading: *heading,
                            speed_kmh: *speed_kmh,
                            timestamp_ms: event.timestamp_ms,
                            run_id: event.run_id,
                        },
                    )
                    .await?;

                let Some(shipment_id) = self.shipments.get(&event.actor_id) else {
                    debug!(actor_id = %event.actor_id, "motion from unassigned actor");
                    return Ok(None);
                };

                let proximity = self.geofences.check_shipment(shipment_id, *position).await?;
                let completed = match &proximity {
                    ProximityResult::Inside {
                        order_id,
                        action: ProximityAction::EnableDelivery,
                        ..
                    } => self
                        .geofences
                        .mark_completed(shipment_id, order_id)
                        .await?
                        .then(|| order_id.clone()),
                    _ => None,
                };
                if let ProximityResult::Inside {
                    order_id,
                    action: ProximityAction::NotifyCustomer,
                    distance_m,
                } = &proximity
                {
                    info!(order_id = %order_id, distance_m, "driver approaching delivery");
                }
                let eta = match &completed {
                    Some(_) => None,
                    None => proximity
                        .distance_m()
                        .and_then(|distance_m| eta(distance_m, DEFAULT_URBAN_SPEED_KMH, event.timestamp_ms)),
                };

                let coverage = self.coverage.resolve_point(*position).await?;
                debug!(
                    actor_id = %event.actor_id,
                    coverage = coverage.status(),
                    zone = coverage.matched().map(|p| p.name.as_str()).unwrap_or("-"),
                    "position update"
                );
                Ok(Some(MotionReport {
                    proximity,
                    coverage,
                    completed,
                    eta,
                }))
            }
        }
    }

    /// Consumes events until the channel closes.
    pub async fn run(&self, mut events: broadcast::Receiver<SimulationEvent>) {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Ok(payload) = serde_json::to_string(&event) {
                        debug!(%payload, "simulation event");
                    }
                    match self.handle(&event).await {
                        Ok(Some(report)) => {
                            debug!(
                                actor_id = %event.actor_id,
                                proximity = ?report.proximity.action(),
                                coverage = report.coverage.status(),
                                completed = report.completed.as_ref().map(|id| id.as_str()).unwrap_or("-"),
                                eta_minutes = report.eta.map(|eta| eta.minutes),
                                "motion processed"
                            );
                        }
                        Ok(None) => {}
                        Err(err) => {
                            warn!(actor_id = %event.actor_id, error = %err, "failed to process event");
                        }
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event consumer lagging behind simulator");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
}
