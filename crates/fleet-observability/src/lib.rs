//! Process-wide logging and metrics setup for fleet services.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::{AddrParseError, SocketAddr};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

const FALLBACK_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub service_name: String,
    pub environment: String,
    pub log_level: String,
    pub metrics_addr: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ObservabilityHandle {
    pub service_name: String,
    pub environment: String,
    /// Where Prometheus scrapes from; `None` when the exporter is off.
    pub metrics_listener: Option<SocketAddr>,
}

impl ObservabilityHandle {
    pub fn metrics_enabled(&self) -> bool {
        self.metrics_listener.is_some()
    }
}

#[derive(Debug, Error)]
pub enum MetricsSetupError {
    #[error("invalid FLEET_METRICS_ADDR {addr:?}: {source}")]
    InvalidAddr {
        addr: String,
        source: AddrParseError,
    },
    #[error("failed to install Prometheus exporter: {0}")]
    Install(#[from] BuildError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MetricKind {
    Counter,
    Gauge,
}

/// Every metric the fleet crates emit.
const FLEET_METRICS: &[(&str, MetricKind, &str)] = &[
    ("fleet_sim_ticks_total", MetricKind::Counter, "Simulation ticks processed across all actors"),
    ("fleet_sim_waypoints_total", MetricKind::Counter, "Route stops reached by simulated actors"),
    ("fleet_sim_active_actors", MetricKind::Gauge, "Actors with a running simulation"),
    ("fleet_geofence_checks_total", MetricKind::Counter, "Proximity checks, labelled by inside"),
    (
        "fleet_coverage_resolutions_total",
        MetricKind::Counter,
        "Coverage lookups, labelled by verdict status",
    ),
];

/// Installs the global subscriber and, when an address is configured, the
/// Prometheus listener. Neither failure stops the service.
pub fn init(config: &ObservabilityConfig) -> ObservabilityHandle {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new(FALLBACK_LOG_LEVEL));
    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_err()
    {
        tracing::debug!("global subscriber already installed");
    }

    let metrics_listener = match install_exporter(config) {
        Ok(listener) => listener,
        Err(err) => {
            tracing::warn!(service = %config.service_name, error = %err, "metrics exporter disabled");
            None
        }
    };
    // Descriptions are kept by whichever recorder ends up installed, so they
    // are registered even when this process runs without the exporter.
    describe_metrics();

    ObservabilityHandle {
        service_name: config.service_name.clone(),
        environment: config.environment.clone(),
        metrics_listener,
    }
}

pub fn log_startup(handle: &ObservabilityHandle) {
    match handle.metrics_listener {
        Some(addr) => tracing::info!(
            service = %handle.service_name,
            environment = %handle.environment,
            metrics = %addr,
            "fleet service starting"
        ),
        None => tracing::info!(
            service = %handle.service_name,
            environment = %handle.environment,
            "fleet service starting without metrics exporter"
        ),
    }
}

/// An unset or blank address turns the exporter off.
fn metrics_listen_addr(raw: Option<&str>) -> Result<Option<SocketAddr>, MetricsSetupError> {
    let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return Ok(None);
    };
    raw.parse()
        .map(Some)
        .map_err(|source| MetricsSetupError::InvalidAddr {
            addr: raw.to_string(),
            source,
        })
}

fn install_exporter(config: &ObservabilityConfig) -> Result<Option<SocketAddr>, MetricsSetupError> {
    let Some(addr) = metrics_listen_addr(config.metrics_addr.as_deref())? else {
        return Ok(None);
    };
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .add_global_label("service", config.service_name.clone())
        .add_global_label("environment", config.environment.clone())
        .install()?;
    Ok(Some(addr))
}

fn describe_metrics() {
    for &(name, kind, help) in FLEET_METRICS {
        match kind {
            MetricKind::Counter => metrics::describe_counter!(name, help),
            MetricKind::Gauge => metrics::describe_gauge!(name, help),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn config(log_level: &str, metrics_addr: Option<&str>) -> ObservabilityConfig {
        ObservabilityConfig {
            service_name: "fleet-test".to_string(),
            environment: "test".to_string(),
            log_level: log_level.to_string(),
            metrics_addr: metrics_addr.map(str::to_string),
        }
    }

    #[test]
    fn blank_or_missing_address_turns_metrics_off() {
        assert!(metrics_listen_addr(None).unwrap().is_none());
        assert!(metrics_listen_addr(Some("  ")).unwrap().is_none());
        assert_eq!(
            metrics_listen_addr(Some(" 127.0.0.1:9464 ")).unwrap(),
            Some(SocketAddr::from(([127, 0, 0, 1], 9464)))
        );
    }

    #[test]
    fn unparsable_address_names_the_value() {
        let err = metrics_listen_addr(Some("nowhere")).unwrap_err();
        assert!(matches!(err, MetricsSetupError::InvalidAddr { ref addr, .. } if addr == "nowhere"));
        assert!(err.to_string().contains("\"nowhere\""));
    }

    #[test]
    fn bad_settings_are_not_fatal() {
        let handle = init(&config("not a filter ===", Some("nowhere")));
        assert!(!handle.metrics_enabled());
        assert_eq!(handle.service_name, "fleet-test");
        assert_eq!(handle.environment, "test");
        log_startup(&handle);
    }

    #[test]
    fn metric_names_are_unique_and_prefixed() {
        let mut seen = HashSet::new();
        for (name, _, help) in FLEET_METRICS {
            assert!(name.starts_with("fleet_"), "{name}");
            assert!(!help.is_empty(), "{name}");
            assert!(seen.insert(*name), "duplicate {name}");
        }
    }
}
