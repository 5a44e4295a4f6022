//! Alert dispatch
//!
//! ```text
//! IngestionPipeline ──dispatch()──► QueueDispatcher ──mpsc──► AlertProcessor ──► Notifier
//!                                   (try_send, bounded)       (background task)   (webhook | log)
//! ```
//!
//! The pipeline only sees [`AlertDispatcher`]; a full or closed queue is a
//! `Dispatch` error it logs and moves past.

mod notifier;
mod processor;
mod queue;

pub use notifier::{LogNotifier, NotificationPayload, Notifier, WebhookNotifier};
pub use processor::{AlertProcessor, ProcessorStats};
pub use queue::QueueDispatcher;

use crate::models::AlertEvent;
use async_trait::async_trait;
use errors::CityResult;

/// Alert channel consumed by the ingestion pipeline
#[async_trait]
pub trait AlertDispatcher: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Hand one alert to the channel; `Err` means it was not accepted
    async fn dispatch(&self, alert: &AlertEvent) -> CityResult<()>;
}

/// Dispatcher used when alert delivery is disabled
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDispatcher;

#[async_trait]
impl AlertDispatcher for NoopDispatcher {
    fn name(&self) -> &'static str {
        "noop"
    }

    async fn dispatch(&self, alert: &AlertEvent) -> CityResult<()> {
        tracing::debug!(sensor_id = %alert.sensor, level = %alert.level, "Dispatch disabled, alert dropped");
        Ok(())
    }
}
