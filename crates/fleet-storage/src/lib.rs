use async_trait::async_trait;
use fleet_core::{ActorId, EpochMillis, ErrorCode, FleetError, OrderId, RunId, ShipmentId};
use fleet_geo::{Geofence, Point, Polygon};
use serde::{Deserialize, Serialize};
use std::fmt;

mod memory;
pub use memory::{MemoryGeofenceStore, MemoryLocationStore, MemoryPolygonStore};

#[derive(Debug, Clone)]
pub struct StorageError {
    pub message: String,
}

impl StorageError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for StorageError {}

impl From<StorageError> for FleetError {
    fn from(value: StorageError) -> Self {
        FleetError::new(ErrorCode::Storage, value.message)
    }
}

/// Source of coverage zones. `list` must return polygons in a stable order,
/// since coverage resolution breaks ties by position.
#[async_trait]
pub trait PolygonRepository: Send + Sync {
    async fn list(&self) -> Result<Vec<Polygon>, StorageError>;
    /// Inserts or replaces by id. A replaced polygon keeps its list position.
    async fn upsert(&self, polygon: Polygon) -> Result<(), StorageError>;
}

/// Delivery geofences grouped by shipment.
#[async_trait]
pub trait GeofenceRepository: Send + Sync {
    /// Replaces every geofence of `shipment_id`; returns how many were stored.
    async fn replace_shipment(
        &self,
        shipment_id: ShipmentId,
        geofences: Vec<Geofence>,
    ) -> Result<usize, StorageError>;

    /// `None` when the shipment was never registered.
    async fn list_by_shipment(
        &self,
        shipment_id: &ShipmentId,
    ) -> Result<Option<Vec<Geofence>>, StorageError>;

    async fn list_all(&self) -> Result<Vec<(ShipmentId, Vec<Geofence>)>, StorageError>;

    /// Returns false if the shipment or order is unknown, or the fence was already completed.
    async fn mark_completed(
        &self,
        shipment_id: &ShipmentId,
        order_id: &OrderId,
    ) -> Result<bool, StorageError>;
}

/// Latest reported fix of one actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastKnownLocation {
    pub position: Point,
    pub heading: f64,
    pub speed_kmh: f64,
    pub timestamp_ms: EpochMillis,
    pub run_id: RunId,
}

/// Live tracking: one slot per actor, overwritten on every fix.
#[async_trait]
pub trait LocationRepository: Send + Sync {
    /// Stores `location` unless a newer fix is already held; returns whether it was stored.
    async fn record(
        &self,
        actor_id: ActorId,
        location: LastKnownLocation,
    ) -> Result<bool, StorageError>;

    /// Every tracked actor, sorted by id.
    async fn list(&self) -> Result<Vec<(ActorId, LastKnownLocation)>, StorageError>;
}
