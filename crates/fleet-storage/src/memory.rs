use crate::{
    GeofenceRepository, LastKnownLocation, LocationRepository, PolygonRepository, StorageError,
};
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use fleet_core::{ActorId, OrderId, PolygonId, ShipmentId};
use fleet_geo::{Geofence, Polygon};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Process-local polygon store. Listing preserves first-insertion order.
#[derive(Debug, Default)]
pub struct MemoryPolygonStore {
    polygons: DashMap<PolygonId, (u64, Polygon)>,
    next_seq: AtomicU64,
}

impl MemoryPolygonStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.polygons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    fn insert(&self, polygon: Polygon) {
        self.polygons
            .entry(polygon.id.clone())
            .and_modify(|(_, existing)| *existing = polygon.clone())
            .or_insert_with(|| (self.next_seq.fetch_add(1, Ordering::Relaxed), polygon));
    }
}

#[async_trait]
impl PolygonRepository for MemoryPolygonStore {
    async fn list(&self) -> Result<Vec<Polygon>, StorageError> {
        let mut entries: Vec<(u64, Polygon)> = self
            .polygons
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        entries.sort_by_key(|(seq, _)| *seq);
        Ok(entries.into_iter().map(|(_, polygon)| polygon).collect())
    }

    async fn upsert(&self, polygon: Polygon) -> Result<(), StorageError> {
        self.insert(polygon);
        Ok(())
    }
}

/// Process-local geofence store keyed by shipment. Per-shipment updates
/// lock only that shipment's entry.
#[derive(Debug, Default)]
pub struct MemoryGeofenceStore {
    shipments: DashMap<ShipmentId, Vec<Geofence>>,
}

impl MemoryGeofenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GeofenceRepository for MemoryGeofenceStore {
    async fn replace_shipment(
        &self,
        shipment_id: ShipmentId,
        geofences: Vec<Geofence>,
    ) -> Result<usize, StorageError> {
        let count = geofences.len();
        self.shipments.insert(shipment_id, geofences);
        Ok(count)
    }

    async fn list_by_shipment(
        &self,
        shipment_id: &ShipmentId,
    ) -> Result<Option<Vec<Geofence>>, StorageError> {
        Ok(self
            .shipments
            .get(shipment_id)
            .map(|entry| entry.value().clone()))
    }

    async fn list_all(&self) -> Result<Vec<(ShipmentId, Vec<Geofence>)>, StorageError> {
        let mut all: Vec<(ShipmentId, Vec<Geofence>)> = self
            .shipments
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(all)
    }

    async fn mark_completed(
        &self,
        shipment_id: &ShipmentId,
        order_id: &OrderId,
    ) -> Result<bool, StorageError> {
        let Some(mut fences) = self.shipments.get_mut(shipment_id) else {
            debug!(shipment_id = %shipment_id, "mark_completed on unknown shipment");
            return Ok(false);
        };
        Ok(fences
            .iter_mut()
            .find(|fence| &fence.order_id == order_id)
            .is_some_and(Geofence::complete))
    }
}

/// Process-local last-known-location table.
#[derive(Debug, Default)]
pub struct MemoryLocationStore {
    locations: DashMap<ActorId, LastKnownLocation>,
}

impl MemoryLocationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LocationRepository for MemoryLocationStore {
    async fn record(
        &self,
        actor_id: ActorId,
        location: LastKnownLocation,
    ) -> Result<bool, StorageError> {
        match self.locations.entry(actor_id) {
            Entry::Occupied(mut slot) => {
                if slot.get().timestamp_ms > location.timestamp_ms {
                    debug!(actor_id = %slot.key(), "dropping stale location");
                    return Ok(false);
                }
                slot.insert(location);
            }
            Entry::Vacant(slot) => {
                slot.insert(location);
            }
        }
        Ok(true)
    }

    async fn list(&self) -> Result<Vec<(ActorId, LastKnownLocation)>, StorageError> {
        let mut all: Vec<(ActorId, LastKnownLocation)> = self
            .locations
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(all)
    }
}
