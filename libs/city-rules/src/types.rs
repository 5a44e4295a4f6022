//! Threshold type definitions
//!
//! - AlertLevel: severity produced by the evaluator
//! - Threshold: warning/critical pair for one sensor type
//! - ThresholdTable: immutable sensor-type → threshold lookup

use errors::{CityError, CityResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ============================================================================
// Alert Level
// ============================================================================

/// Alert severity, ordered so that `Critical > Warning`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Warning,
    Critical,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Warning => "warning",
            AlertLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Threshold
// ============================================================================

/// Warning/critical pair for one sensor type
///
/// A missing `warning` disables alerting for the type entirely; a missing
/// `critical` caps the severity at [`AlertLevel::Warning`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    #[serde(default)]
    pub warning: Option<f64>,
    #[serde(default)]
    pub critical: Option<f64>,
}

impl Threshold {
    pub fn new(warning: f64, critical: f64) -> Self {
        Self {
            warning: Some(warning),
            critical: Some(critical),
        }
    }

    pub fn warning_only(warning: f64) -> Self {
        Self {
            warning: Some(warning),
            critical: None,
        }
    }

    /// Check that both limits are finite and ordered
    pub fn validate(&self, sensor_type: &str) -> CityResult<()> {
        for (name, limit) in [("warning", self.warning), ("critical", self.critical)] {
            if let Some(v) = limit {
                if !v.is_finite() {
                    return Err(CityError::InvalidConfig {
                        field: format!("thresholds.{}.{}", sensor_type, name),
                        reason: format!("limit must be finite, got {}", v),
                    });
                }
            }
        }

        if let (Some(w), Some(c)) = (self.warning, self.critical) {
            if w > c {
                return Err(CityError::InvalidConfig {
                    field: format!("thresholds.{}", sensor_type),
                    reason: format!("warning ({}) exceeds critical ({})", w, c),
                });
            }
        }

        Ok(())
    }
}

// ============================================================================
// Threshold Table
// ============================================================================

/// Sensor-type keyed threshold table
///
/// Built once at startup and shared read-only (typically behind an `Arc`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThresholdTable {
    rules: HashMap<String, Threshold>,
}

impl ThresholdTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, used while assembling configuration
    pub fn with_rule(mut self, sensor_type: impl Into<String>, threshold: Threshold) -> Self {
        self.rules.insert(sensor_type.into(), threshold);
        self
    }

    pub fn get(&self, sensor_type: &str) -> Option<&Threshold> {
        self.rules.get(sensor_type)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Sensor types with a configured threshold
    pub fn sensor_types(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    pub fn validate(&self) -> CityResult<()> {
        for (sensor_type, threshold) in &self.rules {
            threshold.validate(sensor_type)?;
        }
        Ok(())
    }
}

impl From<HashMap<String, Threshold>> for ThresholdTable {
    fn from(rules: HashMap<String, Threshold>) -> Self {
        Self { rules }
    }
}
