//! Background alert processor
//!
//! Consumes the alert queue until every sender is dropped, logging each alert
//! and handing a notification payload to the configured [`Notifier`].
//! Delivery failures are logged and never stop the loop.

use super::notifier::{NotificationPayload, Notifier};
use crate::models::AlertEvent;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Counters returned when the processor stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessorStats {
    pub processed: u64,
    pub delivered: u64,
    pub failed: u64,
}

pub struct AlertProcessor {
    notifier: Arc<dyn Notifier>,
}

impl AlertProcessor {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    /// Run on the current task until the queue closes and drains
    pub async fn run(self, mut rx: mpsc::Receiver<AlertEvent>) -> ProcessorStats {
        let mut stats = ProcessorStats::default();
        debug!("Alert processor started (notifier: {})", self.notifier.name());

        while let Some(alert) = rx.recv().await {
            stats.processed += 1;
            info!(
                sensor_id = %alert.sensor,
                level = %alert.level,
                value = alert.value,
                "Processing alert: {} ({}) - {} level at {}",
                alert.sensor,
                alert.sensor_type,
                alert.level,
                alert.value
            );

            let payload = NotificationPayload::from_alert(&alert);
            match self.notifier.notify(&payload).await {
                Ok(()) => stats.delivered += 1,
                Err(e) => {
                    stats.failed += 1;
                    error!(sensor_id = %alert.sensor, "Notification failed: {}", e);
                },
            }
        }

        info!(
            "Alert processor stopped: {} processed, {} delivered, {} failed",
            stats.processed, stats.delivered, stats.failed
        );
        stats
    }

    pub fn spawn(self, rx: mpsc::Receiver<AlertEvent>) -> JoinHandle<ProcessorStats> {
        tokio::spawn(self.run(rx))
    }
}
