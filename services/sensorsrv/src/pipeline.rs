//! Ingestion pipeline
//!
//! For each reading, in batch order:
//!
//! ```text
//! RawReading ── validate ──✗──► ItemFailure { kind: malformed }
//!      │
//!      ▼
//!  evaluate(type, value) ──► Some(level) ──► AlertEvent ──► spawn dispatch (bounded, errors logged)
//!      │                                                     ┆ not awaited
//!      ▼
//!  history.append(sensor_id, value, unit) ──✗──► ItemFailure { kind: storage }
//!      │
//!      ▼
//!  accepted += 1
//! ```
//!
//! Dispatch runs in its own task, so a slow or hung dispatcher costs the
//! batch nothing. Alerts from one batch may reach the dispatcher in any order.

use crate::dispatch::AlertDispatcher;
use crate::models::{AlertEvent, FailureKind, IngestReport, ItemFailure, RawReading, Reading};
use city_history::{HistoryStore, SystemTimeProvider, TimeProvider};
use city_rules::{evaluate, ThresholdTable};
use errors::{CityError, CityResult};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub struct IngestionPipeline {
    history: Arc<HistoryStore>,
    thresholds: Arc<ThresholdTable>,
    dispatcher: Arc<dyn AlertDispatcher>,
    dispatch_timeout: Duration,
    clock: Arc<dyn TimeProvider>,
}

impl IngestionPipeline {
    pub fn new(
        history: Arc<HistoryStore>,
        thresholds: Arc<ThresholdTable>,
        dispatcher: Arc<dyn AlertDispatcher>,
        dispatch_timeout: Duration,
    ) -> Self {
        Self {
            history,
            thresholds,
            dispatcher,
            dispatch_timeout,
            clock: Arc::new(SystemTimeProvider),
        }
    }

    /// Clock for the alert timestamp and missing reading timestamps
    pub fn with_clock(mut self, clock: Arc<dyn TimeProvider>) -> Self {
        self.clock = clock;
        self
    }

    pub fn history(&self) -> &Arc<HistoryStore> {
        &self.history
    }

    pub fn thresholds(&self) -> &ThresholdTable {
        &self.thresholds
    }

    /// Ingest one batch
    ///
    /// Never fails as a whole: malformed readings and storage failures are
    /// reported per item, dispatch failures are logged and swallowed.
    pub async fn ingest(&self, readings: Vec<RawReading>) -> IngestReport {
        let now = self.clock.now_millis();
        let mut report = IngestReport::default();

        for (index, raw) in readings.into_iter().enumerate() {
            let sensor_id = raw.sensor_id.clone();
            let reading = match raw.validate(now) {
                Ok(r) => r,
                Err(e) => {
                    warn!(index, "Rejected reading: {}", e);
                    report.failures.push(failure(index, sensor_id, FailureKind::Malformed, &e));
                    continue;
                },
            };

            match self.process(&reading, now).await {
                (alert, Ok(())) => {
                    report.accepted += 1;
                    report.alerts.extend(alert);
                },
                (alert, Err(e)) => {
                    warn!(sensor_id = %reading.sensor_id, "History append failed: {}", e);
                    report.alerts.extend(alert);
                    report.failures.push(failure(
                        index,
                        Some(reading.sensor_id),
                        FailureKind::Storage,
                        &e,
                    ));
                },
            }
        }

        debug!(
            accepted = report.accepted,
            alerts = report.alerts.len(),
            failures = report.failures.len(),
            "Batch ingested"
        );
        report
    }

    /// Ingest untyped JSON items; items that do not parse as readings are malformed
    pub async fn ingest_json(&self, items: Vec<serde_json::Value>) -> IngestReport {
        let total = items.len();
        let mut parsed = Vec::with_capacity(total);
        let mut rejected = Vec::new();

        for (index, item) in items.into_iter().enumerate() {
            let sensor_id = ["sensor_id", "sensorId", "id"]
                .iter()
                .find_map(|k| item.get(*k))
                .and_then(|v| v.as_str())
                .map(str::to_string);
            match serde_json::from_value::<RawReading>(item) {
                Ok(raw) => parsed.push((index, raw)),
                Err(e) => rejected.push(ItemFailure {
                    index,
                    sensor_id,
                    kind: FailureKind::Malformed,
                    reason: e.to_string(),
                }),
            }
        }

        let (indices, readings): (Vec<usize>, Vec<RawReading>) = parsed.into_iter().unzip();
        let mut report = self.ingest(readings).await;

        // Map positions in the parsed sub-batch back onto the submitted batch
        for f in &mut report.failures {
            if let Some(&original) = indices.get(f.index) {
                f.index = original;
            }
        }
        report.failures.extend(rejected);
        report.failures.sort_by_key(|f| f.index);
        debug_assert_eq!(report.total(), total);
        report
    }

    /// Evaluate, hand any alert to a dispatch task, then append
    async fn process(&self, reading: &Reading, now: i64) -> (Option<AlertEvent>, CityResult<()>) {
        let alert = evaluate(&reading.sensor_type, reading.value, &self.thresholds)
            .map(|level| AlertEvent::from_reading(reading, level, now));
        if let Some(alert) = &alert {
            self.dispatch(alert.clone());
        }

        let appended = self
            .history
            .append(&reading.sensor_id, reading.value, &reading.unit)
            .await;
        (alert, appended.map(|_| ()))
    }

    fn dispatch(&self, alert: AlertEvent) {
        let dispatcher = Arc::clone(&self.dispatcher);
        let limit = self.dispatch_timeout;

        tokio::spawn(async move {
            let result = match tokio::time::timeout(limit, dispatcher.dispatch(&alert)).await {
                Ok(r) => r,
                Err(_) => Err(CityError::Dispatch(format!(
                    "{} dispatcher timed out after {}ms",
                    dispatcher.name(),
                    limit.as_millis()
                ))),
            };

            match result {
                Ok(()) => debug!(sensor_id = %alert.sensor, level = %alert.level, "Alert dispatched"),
                Err(e) => warn!(
                    sensor_id = %alert.sensor,
                    level = %alert.level,
                    value = alert.value,
                    "Alert dispatch failed: {}",
                    e
                ),
            }
        });
    }
}

fn failure(index: usize, sensor_id: Option<String>, kind: FailureKind, err: &CityError) -> ItemFailure {
    ItemFailure {
        index,
        sensor_id,
        kind,
        reason: err.to_string(),
    }
}
