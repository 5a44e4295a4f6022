//! Key layout for history records
//!
//! One record per sensor: `history:{sensor_id}` holds a JSON array of
//! `HistoryEntry`, oldest first.

/// Prefix shared by every history record
pub const HISTORY_KEY_PREFIX: &str = "history:";

/// Build the record key for a sensor
///
/// # Example
/// ```
/// use city_history::history_key;
/// assert_eq!(history_key("noise_003"), "history:noise_003");
/// ```
#[inline]
pub fn history_key(sensor_id: &str) -> String {
    format!("{}{}", HISTORY_KEY_PREFIX, sensor_id)
}

/// Recover the sensor id from a record key
#[inline]
pub fn sensor_id_from_key(key: &str) -> Option<&str> {
    key.strip_prefix(HISTORY_KEY_PREFIX)
}
