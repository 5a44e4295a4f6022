//! Mock sensor feed
//!
//! Produces one reading per catalog sensor with a random integer value in the
//! sensor's `[min, max)` range.

use crate::config::{Location, SensorSpec};
use crate::models::RawReading;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// One generated reading in the feed's wire shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedReading {
    pub id: String,
    #[serde(rename = "type")]
    pub sensor_type: String,
    pub location: Location,
    pub value: f64,
    pub unit: String,
    pub timestamp: i64,
    pub status: String,
}

impl From<&SimulatedReading> for RawReading {
    fn from(r: &SimulatedReading) -> Self {
        RawReading::new(&r.id, &r.sensor_type, r.value)
            .with_unit(&r.unit)
            .with_timestamp(r.timestamp)
    }
}

/// Catalog entry as listed by `GET /sensors`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorSummary {
    pub id: String,
    #[serde(rename = "type")]
    pub sensor_type: String,
    pub status: String,
    pub location: String,
}

pub struct SensorSimulator {
    sensors: Vec<SensorSpec>,
}

impl SensorSimulator {
    pub fn new(sensors: Vec<SensorSpec>) -> Self {
        Self { sensors }
    }

    pub fn sensors(&self) -> &[SensorSpec] {
        &self.sensors
    }

    pub fn catalog(&self) -> Vec<SensorSummary> {
        self.sensors
            .iter()
            .map(|s| SensorSummary {
                id: s.id.clone(),
                sensor_type: s.sensor_type.clone(),
                status: s.status.clone(),
                location: s.location.name.clone(),
            })
            .collect()
    }

    /// One reading per sensor, stamped `now_ms`
    pub fn generate(&self, now_ms: i64) -> Vec<SimulatedReading> {
        let mut rng = rand::thread_rng();
        self.sensors
            .iter()
            .map(|s| {
                // Ranges are validated at startup; an empty one pins to min
                let value = if s.min < s.max {
                    rng.gen_range(s.min..s.max)
                } else {
                    s.min
                };
                SimulatedReading {
                    id: s.id.clone(),
                    sensor_type: s.sensor_type.clone(),
                    location: s.location.clone(),
                    value: value as f64,
                    unit: s.unit.clone(),
                    timestamp: now_ms,
                    status: s.status.clone(),
                }
            })
            .collect()
    }
}
