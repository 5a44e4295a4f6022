//! Service configuration
//!
//! Loaded with `common::config_loader::load_config`:
//! defaults < `config/sensorsrv.yaml` < `SENSORSRV_*` environment variables
//! (`__` separates nested keys, e.g. `SENSORSRV_SERVICE__PORT=9000`).

use city_rules::{Threshold, ThresholdTable};
use common::config_loader;
use errors::{CityError, CityResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config/sensorsrv.yaml";
pub const ENV_PREFIX: &str = "SENSORSRV_";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorsrvConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub dispatch: DispatchConfig,
    pub logging: LoggingConfig,
    pub thresholds: ThresholdTable,
    pub sensors: Vec<SensorSpec>,
}

// ============================================================================
// Sections
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub host: String,
    pub port: u16,
    /// Deadline for one ingest request
    pub request_timeout_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "sensorsrv".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8787,
            request_timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub data_dir: Option<PathBuf>,
    pub history_capacity: usize,
    /// Bound on each storage round trip
    pub timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::File,
            data_dir: Some(PathBuf::from("data/history")),
            history_capacity: city_history::DEFAULT_HISTORY_CAPACITY,
            timeout_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Disabled means alerts are still reported but never queued
    pub enabled: bool,
    pub queue_capacity: usize,
    /// Bound on handing one alert to the dispatcher
    pub timeout_ms: u64,
    /// Webhook receiving notification payloads; unset logs them instead
    pub notify_endpoint: Option<String>,
    pub notify_timeout_ms: u64,
    /// How long shutdown waits for queued alerts to drain
    pub drain_timeout_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            queue_capacity: 1024,
            timeout_ms: 1_000,
            notify_endpoint: None,
            notify_timeout_ms: 5_000,
            drain_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: PathBuf,
    pub enable_file: bool,
    pub enable_json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("logs"),
            enable_file: false,
            enable_json: false,
        }
    }
}

/// Simulated sensor in the mock feed catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub sensor_type: String,
    pub unit: String,
    pub location: Location,
    /// Inclusive lower bound of generated values
    pub min: i64,
    /// Exclusive upper bound of generated values
    pub max: i64,
    #[serde(default = "default_status")]
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
    pub name: String,
}

fn default_status() -> String {
    "active".to_string()
}

// ============================================================================
// Defaults for the city deployment
// ============================================================================

pub fn default_thresholds() -> ThresholdTable {
    ThresholdTable::new()
        .with_rule("air_quality", Threshold::new(100.0, 150.0))
        .with_rule("traffic", Threshold::new(60.0, 90.0))
        .with_rule("noise", Threshold::new(65.0, 85.0))
}

pub fn default_sensors() -> Vec<SensorSpec> {
    let sensor = |id: &str, sensor_type: &str, unit: &str, loc: (f64, f64, &str), range: (i64, i64)| {
        SensorSpec {
            id: id.to_string(),
            sensor_type: sensor_type.to_string(),
            unit: unit.to_string(),
            location: Location {
                lat: loc.0,
                lng: loc.1,
                name: loc.2.to_string(),
            },
            min: range.0,
            max: range.1,
            status: default_status(),
        }
    };
    vec![
        sensor(
            "air_quality_001",
            "air_quality",
            "AQI",
            (28.6139, 77.2090, "Connaught Place"),
            (50, 150),
        ),
        sensor(
            "traffic_002",
            "traffic",
            "vehicles/min",
            (28.5355, 77.3910, "Noida Sector 18"),
            (20, 100),
        ),
        sensor(
            "noise_003",
            "noise",
            "dB",
            (28.4595, 77.0266, "Gurgaon Cyber City"),
            (40, 70),
        ),
    ]
}

impl SensorsrvConfig {
    /// Built-in defaults including the city thresholds and sensor catalog
    pub fn city_defaults() -> Self {
        Self {
            thresholds: default_thresholds(),
            sensors: default_sensors(),
            ..Default::default()
        }
    }

    /// Load from an optional file plus `SENSORSRV_*` environment variables
    ///
    /// The threshold table and catalog fall back to the city defaults only
    /// when neither source provides them.
    pub fn load(path: Option<&Path>) -> CityResult<Self> {
        let mut config: Self = config_loader::load_config(path, ENV_PREFIX)?;
        if config.thresholds.is_empty() {
            config.thresholds = default_thresholds();
        }
        if config.sensors.is_empty() {
            config.sensors = default_sensors();
        }
        Ok(config)
    }

    pub fn bind_address(&self) -> String {
        if self.service.host.contains(':') {
            format!("[{}]:{}", self.service.host, self.service.port)
        } else {
            format!("{}:{}", self.service.host, self.service.port)
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.service.request_timeout_ms)
    }

    pub fn validate(&self) -> CityResult<()> {
        let invalid = |field: &str, reason: &str| CityError::InvalidConfig {
            field: field.to_string(),
            reason: reason.to_string(),
        };

        if self.service.name.trim().is_empty() {
            return Err(invalid("service.name", "must not be empty"));
        }
        if self.service.port == 0 {
            return Err(invalid("service.port", "must be non-zero"));
        }
        if self.service.request_timeout_ms == 0 {
            return Err(invalid("service.request_timeout_ms", "must be non-zero"));
        }

        if self.storage.history_capacity == 0 {
            return Err(invalid("storage.history_capacity", "must be at least 1"));
        }
        if self.storage.timeout_ms == 0 {
            return Err(invalid("storage.timeout_ms", "must be non-zero"));
        }
        if self.storage.backend == StorageBackend::File
            && self
                .storage
                .data_dir
                .as_ref()
                .map_or(true, |d| d.as_os_str().is_empty())
        {
            return Err(invalid("storage.data_dir", "required for the file backend"));
        }

        if self.dispatch.enabled {
            if self.dispatch.queue_capacity == 0 {
                return Err(invalid("dispatch.queue_capacity", "must be at least 1"));
            }
            if self.dispatch.timeout_ms == 0 {
                return Err(invalid("dispatch.timeout_ms", "must be non-zero"));
            }
        }
        if let Some(endpoint) = &self.dispatch.notify_endpoint {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                return Err(invalid(
                    "dispatch.notify_endpoint",
                    "must be an http:// or https:// URL",
                ));
            }
        }

        self.thresholds.validate()?;

        let mut seen = HashSet::new();
        for sensor in &self.sensors {
            if sensor.id.trim().is_empty() {
                return Err(invalid("sensors.id", "must not be empty"));
            }
            if !seen.insert(sensor.id.as_str()) {
                return Err(CityError::InvalidConfig {
                    field: format!("sensors.{}", sensor.id),
                    reason: "duplicate sensor id".to_string(),
                });
            }
            if sensor.min >= sensor.max {
                return Err(CityError::InvalidConfig {
                    field: format!("sensors.{}", sensor.id),
                    reason: format!("min ({}) must be below max ({})", sensor.min, sensor.max),
                });
            }
        }

        Ok(())
    }
}
