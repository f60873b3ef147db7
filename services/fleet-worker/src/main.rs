mod pipeline;
mod zones;

use fleet_config::FleetConfig;
use fleet_core::ActorId;
use fleet_coverage::CoverageService;
use fleet_geofence::GeofenceTracker;
use fleet_observability::{ObservabilityConfig, init, log_startup};
use fleet_sim::{Simulator, SimulatorConfig, predefined_routes};
use fleet_storage::{MemoryGeofenceStore, MemoryPolygonStore};
use pipeline::Pipeline;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = FleetConfig::from_env("fleet-worker");
    let obs_config = ObservabilityConfig {
        service_name: config.service.service_name.clone(),
        environment: config.service.environment.to_string(),
        log_level: config.service.log_level.clone(),
        metrics_addr: config.service.metrics_addr.clone(),
    };
    let handle = init(&obs_config);
    log_startup(&handle);

    let polygons = Arc::new(MemoryPolygonStore::new());
    zones::load_into(polygons.as_ref(), &config.coverage_file).await?;
    tracing::info!(zones = polygons.len(), "coverage store ready");
    let coverage = CoverageService::new(polygons);
    let geofences = GeofenceTracker::with_default_radius(
        Arc::new(MemoryGeofenceStore::new()),
        config.geofence.default_radius_m,
    );
    let mut pipeline = Pipeline::new(coverage, geofences);

    let simulator = Simulator::new(SimulatorConfig {
        tick_interval: Some(config.simulation.tick_interval()),
        ..SimulatorConfig::default()
    });
    let events = simulator.subscribe();

    for route in predefined_routes() {
        let actor_id = ActorId::new(format!("driver-{}", route.id));
        let shipment_id = pipeline.assign_route(actor_id.clone(), &route).await?;
        let run_id = simulator.start(actor_id.clone(), route, config.simulation.default_speed_kmh)?;
        tracing::info!(
            actor_id = %actor_id,
            shipment_id = %shipment_id,
            run_id = %run_id,
            "driver dispatched"
        );
    }

    let shutdown = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install ctrl-c handler: {}", err);
        }
    };
    tokio::select! {
        _ = pipeline.run(events) => {}
        _ = shutdown => {
            tracing::info!("shutdown requested");
        }
    }

    let stopped = simulator.stop_all();
    tracing::info!(stopped, "simulations stopped");
    for (actor_id, fix) in pipeline.live_tracking().await? {
        tracing::info!(
            actor_id = %actor_id,
            lat = fix.position.lat,
            lng = fix.position.lng,
            heading = fix.heading,
            timestamp_ms = fix.timestamp_ms,
            "last known location"
        );
    }
    Ok(())
}
