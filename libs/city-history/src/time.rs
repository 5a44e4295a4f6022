//! Time provider abstraction for history appends
//!
//! Keeps clock access out of the storage path so tests can pin or step time.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Time provider trait for generating timestamps
pub trait TimeProvider: Send + Sync + 'static {
    /// Get current timestamp in milliseconds since Unix epoch
    fn now_millis(&self) -> i64;
}

/// System time provider using local clock
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now_millis(&self) -> i64 {
        // A clock set before 1970 reports 0 rather than failing the append
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }
}

/// Fixed time provider for testing
///
/// Returns a predetermined timestamp, useful for deterministic tests.
#[derive(Clone, Copy, Debug)]
pub struct FixedTimeProvider {
    timestamp_ms: i64,
}

impl FixedTimeProvider {
    pub fn new(timestamp_ms: i64) -> Self {
        Self { timestamp_ms }
    }
}

impl TimeProvider for FixedTimeProvider {
    fn now_millis(&self) -> i64 {
        self.timestamp_ms
    }
}

/// Manually advanced clock for ordering tests
#[derive(Debug, Default)]
pub struct ManualTimeProvider {
    timestamp_ms: AtomicI64,
}

impl ManualTimeProvider {
    pub fn new(timestamp_ms: i64) -> Self {
        Self {
            timestamp_ms: AtomicI64::new(timestamp_ms),
        }
    }

    pub fn set(&self, timestamp_ms: i64) {
        self.timestamp_ms.store(timestamp_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: i64) {
        self.timestamp_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl TimeProvider for ManualTimeProvider {
    fn now_millis(&self) -> i64 {
        self.timestamp_ms.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_time_provider() {
        let provider = SystemTimeProvider;
        let time1 = provider.now_millis();
        std::thread::sleep(std::time::Duration::from_millis(10));
        let time2 = provider.now_millis();

        assert!(time1 > 0);
        assert!(time2 - time1 >= 10);
    }

    #[test]
    fn test_fixed_time_provider() {
        let provider = FixedTimeProvider::new(1_700_000_000_000);
        assert_eq!(provider.now_millis(), 1_700_000_000_000);
        assert_eq!(provider.now_millis(), 1_700_000_000_000);
    }

    #[test]
    fn test_manual_time_provider() {
        let provider = ManualTimeProvider::new(1_000);
        provider.advance(250);
        assert_eq!(provider.now_millis(), 1_250);
        provider.set(5);
        assert_eq!(provider.now_millis(), 5);
    }
}
