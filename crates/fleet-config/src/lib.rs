use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use std::{env, fmt};

pub const DEFAULT_TICK_MS: u64 = 2_000;
pub const DEFAULT_SPEED_KMH: f64 = 60.0;
pub const DEFAULT_GEOFENCE_RADIUS_M: f64 = 200.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Local,
    Dev,
    Test,
    Staging,
    Prod,
}

impl Environment {
    pub fn from_env(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "local" => Self::Local,
            "dev" | "development" => Self::Dev,
            "test" | "testing" => Self::Test,
            "staging" => Self::Staging,
            "prod" | "production" => Self::Prod,
            _ => Self::Local,
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            Self::Local => "local",
            Self::Dev => "dev",
            Self::Test => "test",
            Self::Staging => "staging",
            Self::Prod => "prod",
        };
        write!(f, "{}", value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub service_name: String,
    pub environment: Environment,
    pub metrics_addr: Option<String>,
    pub log_level: String,
    pub data_dir: PathBuf,
}

impl ServiceConfig {
    pub fn from_env(default_service_name: &str) -> Self {
        Self::from_lookup(default_service_name, &process_env)
    }

    pub fn from_lookup(default_service_name: &str, lookup: &impl Fn(&str) -> Option<String>) -> Self {
        let vars = Vars(lookup);
        Self {
            service_name: vars.string("FLEET_SERVICE_NAME", default_service_name),
            environment: Environment::from_env(&vars.string("FLEET_ENV", "local")),
            metrics_addr: vars.get("FLEET_METRICS_ADDR"),
            log_level: vars.string("FLEET_LOG_LEVEL", "info"),
            data_dir: PathBuf::from(vars.string("FLEET_DATA_DIR", "/var/lib/fleet")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub tick_ms: u64,
    pub default_speed_kmh: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_ms: DEFAULT_TICK_MS,
            default_speed_kmh: DEFAULT_SPEED_KMH,
        }
    }
}

impl SimulationConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(&process_env)
    }

    pub fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Self {
        let vars = Vars(lookup);
        Self {
            tick_ms: vars
                .parsed::<u64>("FLEET_SIM_TICK_MS")
                .filter(|ms| *ms > 0)
                .unwrap_or(DEFAULT_TICK_MS),
            default_speed_kmh: vars
                .parsed::<f64>("FLEET_SIM_DEFAULT_SPEED_KMH")
                .filter(|kmh| kmh.is_finite() && *kmh > 0.0)
                .unwrap_or(DEFAULT_SPEED_KMH),
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeofenceConfig {
    pub default_radius_m: f64,
}

impl Default for GeofenceConfig {
    fn default() -> Self {
        Self {
            default_radius_m: DEFAULT_GEOFENCE_RADIUS_M,
        }
    }
}

impl GeofenceConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(&process_env)
    }

    pub fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Self {
        let default_radius_m = Vars(lookup)
            .parsed::<f64>("FLEET_GEOFENCE_DEFAULT_RADIUS_M")
            .filter(|m| m.is_finite() && *m >= 0.0)
            .unwrap_or(DEFAULT_GEOFENCE_RADIUS_M);
        Self { default_radius_m }
    }
}

/// Everything the worker needs, read in one pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetConfig {
    pub service: ServiceConfig,
    pub simulation: SimulationConfig,
    pub geofence: GeofenceConfig,
    /// JSON array of coverage polygons. Defaults to `<data_dir>/coverage.json`.
    pub coverage_file: PathBuf,
}

impl FleetConfig {
    pub fn from_env(default_service_name: &str) -> Self {
        Self::from_lookup(default_service_name, &process_env)
    }

    pub fn from_lookup(default_service_name: &str, lookup: &impl Fn(&str) -> Option<String>) -> Self {
        let service = ServiceConfig::from_lookup(default_service_name, lookup);
        let coverage_file = Vars(lookup)
            .get("FLEET_COVERAGE_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| service.data_dir.join("coverage.json"));
        Self {
            simulation: SimulationConfig::from_lookup(lookup),
            geofence: GeofenceConfig::from_lookup(lookup),
            service,
            coverage_file,
        }
    }
}

fn process_env(key: &str) -> Option<String> {
    env::var(key).ok()
}

struct Vars<'a, F>(&'a F);

impl<F: Fn(&str) -> Option<String>> Vars<'_, F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|value| !value.trim().is_empty())
    }

    fn string(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|value| value.trim().parse::<T>().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = FleetConfig::from_lookup("fleet-worker", &lookup(&[]));
        assert_eq!(config.service.service_name, "fleet-worker");
        assert_eq!(config.service.environment, Environment::Local);
        assert_eq!(config.service.log_level, "info");
        assert_eq!(config.service.metrics_addr, None);
        assert_eq!(config.simulation.tick_interval(), Duration::from_millis(2_000));
        assert_eq!(config.simulation.default_speed_kmh, 60.0);
        assert_eq!(config.geofence.default_radius_m, 200.0);
        assert_eq!(config.coverage_file, PathBuf::from("/var/lib/fleet/coverage.json"));
    }

    #[test]
    fn values_are_read_from_lookup() {
        let config = FleetConfig::from_lookup(
            "fleet-worker",
            &lookup(&[
                ("FLEET_ENV", "Production"),
                ("FLEET_DATA_DIR", "/tmp/fleet"),
                ("FLEET_METRICS_ADDR", "127.0.0.1:9000"),
                ("FLEET_SIM_TICK_MS", "500"),
                ("FLEET_SIM_DEFAULT_SPEED_KMH", "35.5"),
                ("FLEET_GEOFENCE_DEFAULT_RADIUS_M", "150"),
            ]),
        );
        assert_eq!(config.service.environment, Environment::Prod);
        assert_eq!(config.service.metrics_addr.as_deref(), Some("127.0.0.1:9000"));
        assert_eq!(config.simulation.tick_ms, 500);
        assert_eq!(config.simulation.default_speed_kmh, 35.5);
        assert_eq!(config.geofence.default_radius_m, 150.0);
        assert_eq!(config.coverage_file, PathBuf::from("/tmp/fleet/coverage.json"));
    }

    #[test]
    fn explicit_coverage_file_wins() {
        let config = FleetConfig::from_lookup(
            "w",
            &lookup(&[("FLEET_COVERAGE_FILE", "/etc/zones.json")]),
        );
        assert_eq!(config.coverage_file, PathBuf::from("/etc/zones.json"));
    }

    #[test]
    fn unusable_values_fall_back() {
        let env = lookup(&[
            ("FLEET_SIM_TICK_MS", "0"),
            ("FLEET_SIM_DEFAULT_SPEED_KMH", "-3"),
            ("FLEET_GEOFENCE_DEFAULT_RADIUS_M", "wide"),
            ("FLEET_LOG_LEVEL", "  "),
        ]);
        let simulation = SimulationConfig::from_lookup(&env);
        assert_eq!(simulation.tick_ms, DEFAULT_TICK_MS);
        assert_eq!(simulation.default_speed_kmh, DEFAULT_SPEED_KMH);
        assert_eq!(
            GeofenceConfig::from_lookup(&env).default_radius_m,
            DEFAULT_GEOFENCE_RADIUS_M
        );
        assert_eq!(ServiceConfig::from_lookup("w", &env).log_level, "info");
    }

    #[test]
    fn environment_names_are_lenient() {
        assert_eq!(Environment::from_env("DEV"), Environment::Dev);
        assert_eq!(Environment::from_env("testing"), Environment::Test);
        assert_eq!(Environment::from_env("mars"), Environment::Local);
        assert_eq!(Environment::Staging.to_string(), "staging");
    }
}
