use fleet_core::{FleetResult, OrderId, ShipmentId};
use fleet_geo::{Geofence, Point, distance, is_valid};
use fleet_storage::GeofenceRepository;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Inner radius where the driver may hand over the parcel.
pub const ENABLE_DELIVERY_RADIUS_M: f64 = 100.0;

pub const DEFAULT_GEOFENCE_RADIUS_M: f64 = 200.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProximityAction {
    EnableDelivery,
    NotifyCustomer,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProximityResult {
    Inside {
        order_id: OrderId,
        distance_m: f64,
        action: ProximityAction,
    },
    /// `nearest_order_id` and `distance_m` are `None` when there was nothing
    /// pending to compare against. `action` is always [`ProximityAction::None`].
    Outside {
        nearest_order_id: Option<OrderId>,
        distance_m: Option<f64>,
        action: ProximityAction,
    },
}

impl ProximityResult {
    fn nothing_pending() -> Self {
        Self::Outside {
            nearest_order_id: None,
            distance_m: None,
            action: ProximityAction::None,
        }
    }

    pub fn is_inside(&self) -> bool {
        matches!(self, Self::Inside { .. })
    }

    pub fn action(&self) -> ProximityAction {
        match self {
            Self::Inside { action, .. } | Self::Outside { action, .. } => *action,
        }
    }

    pub fn distance_m(&self) -> Option<f64> {
        match self {
            Self::Inside { distance_m, .. } => Some(*distance_m),
            Self::Outside { distance_m, .. } => *distance_m,
        }
    }
}

/// Proximity of `position` to the closest pending geofence.
///
/// Completed or malformed fences are ignored. Ties go to the earlier fence.
pub fn check<'a>(
    position: Point,
    geofences: impl IntoIterator<Item = &'a Geofence>,
) -> ProximityResult {
    let mut closest: Option<(&Geofence, f64)> = None;
    for fence in geofences {
        if !fence.is_pending() || !is_well_formed(fence) {
            continue;
        }
        let d = distance(position, fence.center);
        if closest.is_none_or(|(_, best)| d < best) {
            closest = Some((fence, d));
        }
    }

    let result = match closest {
        Some((fence, d)) if d <= fence.radius_m => ProximityResult::Inside {
            order_id: fence.order_id.clone(),
            distance_m: d,
            action: if d <= ENABLE_DELIVERY_RADIUS_M {
                ProximityAction::EnableDelivery
            } else {
                ProximityAction::NotifyCustomer
            },
        },
        Some((fence, d)) => ProximityResult::Outside {
            nearest_order_id: Some(fence.order_id.clone()),
            distance_m: Some(d),
            action: ProximityAction::None,
        },
        None => ProximityResult::nothing_pending(),
    };

    metrics::counter!(
        "fleet_geofence_checks_total",
        "inside" => if result.is_inside() { "true" } else { "false" }
    )
    .increment(1);
    result
}

fn is_well_formed(fence: &Geofence) -> bool {
    is_valid(fence.center) && fence.radius_m.is_finite() && fence.radius_m >= 0.0
}

/// One drop-off to fence when a shipment is registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryStop {
    pub order_id: OrderId,
    pub center: Point,
    #[serde(default)]
    pub radius_m: Option<f64>,
}

/// Shipment-level geofence operations over an injected store.
pub struct GeofenceTracker<R> {
    store: Arc<R>,
    default_radius_m: f64,
}

impl<R> Clone for GeofenceTracker<R> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            default_radius_m: self.default_radius_m,
        }
    }
}

impl<R: GeofenceRepository> GeofenceTracker<R> {
    pub fn new(store: Arc<R>) -> Self {
        Self::with_default_radius(store, DEFAULT_GEOFENCE_RADIUS_M)
    }

    pub fn with_default_radius(store: Arc<R>, default_radius_m: f64) -> Self {
        Self {
            store,
            default_radius_m,
        }
    }

    /// Replaces the shipment's fences with one pending fence per valid stop.
    pub async fn register(
        &self,
        shipment_id: ShipmentId,
        stops: impl IntoIterator<Item = DeliveryStop>,
    ) -> FleetResult<usize> {
        let fences: Vec<Geofence> = stops
            .into_iter()
            .map(|stop| {
                let radius = stop.radius_m.unwrap_or(self.default_radius_m);
                Geofence::pending(stop.order_id, stop.center, radius)
            })
            .filter(|fence| {
                let keep = is_well_formed(fence);
                if !keep {
                    debug!(order_id = %fence.order_id, "dropping malformed delivery stop");
                }
                keep
            })
            .collect();

        let stored = self.store.replace_shipment(shipment_id.clone(), fences).await?;
        info!(shipment_id = %shipment_id, geofences = stored, "geofences registered");
        Ok(stored)
    }

    /// Checks against one shipment. Unknown shipments report nothing pending.
    pub async fn check_shipment(
        &self,
        shipment_id: &ShipmentId,
        position: Point,
    ) -> FleetResult<ProximityResult> {
        let position = position.validate()?;
        let Some(fences) = self.store.list_by_shipment(shipment_id).await? else {
            return Ok(ProximityResult::nothing_pending());
        };
        Ok(check(position, &fences))
    }

    /// Checks against every registered shipment at once.
    pub async fn check_all(&self, position: Point) -> FleetResult<ProximityResult> {
        let position = position.validate()?;
        let shipments = self.store.list_all().await?;
        Ok(check(
            position,
            shipments.iter().flat_map(|(_, fences)| fences.iter()),
        ))
    }

    pub async fn mark_completed(
        &self,
        shipment_id: &ShipmentId,
        order_id: &OrderId,
    ) -> FleetResult<bool> {
        let completed = self.store.mark_completed(shipment_id, order_id).await?;
        if completed {
            info!(shipment_id = %shipment_id, order_id = %order_id, "delivery completed");
        }
        Ok(completed)
    }
}
