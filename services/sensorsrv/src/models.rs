//! Reading, alert and report types
//!
//! - RawReading: ingress shape, every field optional
//! - Reading: validated reading with all required fields present
//! - AlertEvent: threshold breach handed to the dispatcher
//! - IngestReport / ItemFailure: per-batch outcome

use city_rules::AlertLevel;
use errors::{CityError, CityResult};
use serde::{Deserialize, Serialize};

// ============================================================================
// Readings
// ============================================================================

/// Reading as it arrives from a sensor feed or the simulator
///
/// Accepts both `sensor_id`/`sensor_type` and the `id`/`type` spelling used
/// by the mock feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawReading {
    #[serde(default, alias = "id", alias = "sensorId")]
    pub sensor_id: Option<String>,
    #[serde(default, alias = "type", alias = "sensorType")]
    pub sensor_type: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
    /// Epoch milliseconds
    #[serde(default)]
    pub timestamp: Option<i64>,
}

impl RawReading {
    pub fn new(sensor_id: impl Into<String>, sensor_type: impl Into<String>, value: f64) -> Self {
        Self {
            sensor_id: Some(sensor_id.into()),
            sensor_type: Some(sensor_type.into()),
            value: Some(value),
            ..Default::default()
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Check required fields and fill defaults
    ///
    /// `sensor_id` must be non-empty and `value` present and finite. A missing
    /// type becomes `""` (never alerts), a missing unit `""`, a missing
    /// timestamp `now_ms`.
    pub fn validate(self, now_ms: i64) -> CityResult<Reading> {
        let sensor_id = match self.sensor_id {
            Some(id) if !id.trim().is_empty() => id,
            Some(_) => return Err(CityError::MalformedReading("sensor_id is empty".into())),
            None => return Err(CityError::MalformedReading("missing sensor_id".into())),
        };
        let value = self
            .value
            .ok_or_else(|| CityError::MalformedReading(format!("{}: missing value", sensor_id)))?;
        if !value.is_finite() {
            return Err(CityError::MalformedReading(format!(
                "{}: value must be finite",
                sensor_id
            )));
        }

        Ok(Reading {
            sensor_id,
            sensor_type: self.sensor_type.unwrap_or_default(),
            value,
            unit: self.unit.unwrap_or_default(),
            timestamp: self.timestamp.unwrap_or(now_ms),
        })
    }
}

/// Validated reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub sensor_id: String,
    pub sensor_type: String,
    pub value: f64,
    pub unit: String,
    pub timestamp: i64,
}

// ============================================================================
// Alerts
// ============================================================================

/// Threshold breach message, serialized as
/// `{ sensor, type, value, level, timestamp }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub sensor: String,
    #[serde(rename = "type")]
    pub sensor_type: String,
    pub value: f64,
    pub level: AlertLevel,
    /// Epoch milliseconds of the ingest call that raised it
    pub timestamp: i64,
}

impl AlertEvent {
    pub fn from_reading(reading: &Reading, level: AlertLevel, timestamp: i64) -> Self {
        Self {
            sensor: reading.sensor_id.clone(),
            sensor_type: reading.sensor_type.clone(),
            value: reading.value,
            level,
            timestamp,
        }
    }
}

// ============================================================================
// Ingest report
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Malformed,
    Storage,
}

/// One reading that was not recorded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemFailure {
    /// Position in the submitted batch
    pub index: usize,
    #[serde(default)]
    pub sensor_id: Option<String>,
    pub kind: FailureKind,
    pub reason: String,
}

/// Outcome of one ingest call
///
/// `accepted + failures.len()` always equals the batch length. `alerts`
/// lists every alert raised, whether or not dispatch succeeded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    pub accepted: usize,
    pub alerts: Vec<AlertEvent>,
    pub failures: Vec<ItemFailure>,
}

impl IngestReport {
    pub fn total(&self) -> usize {
        self.accepted + self.failures.len()
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_raw_reading_accepts_feed_aliases() {
        let raw: RawReading = serde_json::from_value(serde_json::json!({
            "id": "traffic_002",
            "type": "traffic",
            "value": 75,
            "unit": "vehicles/min",
            "timestamp": 1_700_000_000_000_i64,
            "status": "active"
        }))
        .unwrap();
        assert_eq!(raw.sensor_id.as_deref(), Some("traffic_002"));
        assert_eq!(raw.sensor_type.as_deref(), Some("traffic"));
        assert_eq!(raw.value, Some(75.0));
    }

    #[test]
    fn test_validate_fills_defaults() {
        let reading = RawReading {
            sensor_id: Some("noise_003".into()),
            value: Some(50.0),
            ..Default::default()
        }
        .validate(42)
        .unwrap();
        assert_eq!(reading.sensor_type, "");
        assert_eq!(reading.unit, "");
        assert_eq!(reading.timestamp, 42);
    }

    #[test]
    fn test_validate_rejects_missing_fields() {
        let err = RawReading {
            value: Some(1.0),
            ..Default::default()
        }
        .validate(0)
        .unwrap_err();
        assert!(matches!(err, CityError::MalformedReading(_)));

        let err = RawReading {
            sensor_id: Some("  ".into()),
            value: Some(1.0),
            ..Default::default()
        }
        .validate(0)
        .unwrap_err();
        assert!(err.to_string().contains("empty"));

        let err = RawReading {
            sensor_id: Some("aq".into()),
            ..Default::default()
        }
        .validate(0)
        .unwrap_err();
        assert!(err.to_string().contains("missing value"));

        let err = RawReading::new("aq", "air_quality", f64::NAN)
            .validate(0)
            .unwrap_err();
        assert!(err.to_string().contains("finite"));
    }

    #[test]
    fn test_alert_event_wire_shape() {
        let reading = RawReading::new("air_quality_001", "air_quality", 160.0)
            .with_unit("AQI")
            .validate(5)
            .unwrap();
        let alert = AlertEvent::from_reading(&reading, AlertLevel::Critical, 7);
        assert_eq!(
            serde_json::to_value(&alert).unwrap(),
            serde_json::json!({
                "sensor": "air_quality_001",
                "type": "air_quality",
                "value": 160.0,
                "level": "critical",
                "timestamp": 7
            })
        );
    }

    #[test]
    fn test_failure_kind_lowercase() {
        let failure = ItemFailure {
            index: 1,
            sensor_id: None,
            kind: FailureKind::Malformed,
            reason: "missing value".into(),
        };
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["kind"], "malformed");
        assert!(json["sensor_id"].is_null());
    }
}
