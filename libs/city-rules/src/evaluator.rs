//! Threshold evaluation
//!
//! Pure mapping from `(sensor_type, value)` to an alert decision. Boundaries
//! are inclusive and critical wins over warning.

use crate::types::{AlertLevel, ThresholdTable};

/// Evaluate a reading against the threshold table
///
/// Returns `None` when the sensor type is not in the table, when the type has
/// no warning limit, or when the value is below the warning limit (NaN never
/// reaches any limit).
pub fn evaluate(sensor_type: &str, value: f64, thresholds: &ThresholdTable) -> Option<AlertLevel> {
    let threshold = thresholds.get(sensor_type)?;
    let warning = threshold.warning?;

    if value.is_nan() || value < warning {
        return None;
    }

    match threshold.critical {
        Some(critical) if value >= critical => Some(AlertLevel::Critical),
        _ => Some(AlertLevel::Warning),
    }
}
