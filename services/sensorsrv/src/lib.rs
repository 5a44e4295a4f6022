//! City sensor ingestion service
//!
//! Records readings into a bounded per-sensor history, evaluates them against
//! the threshold table and hands breaches to the alert dispatcher.

pub mod api;
pub mod bootstrap;
pub mod config;
pub mod dispatch;
pub mod models;
pub mod pipeline;
pub mod simulator;

pub use bootstrap::{build_runtime, ServiceRuntime};
pub use config::SensorsrvConfig;
pub use models::{AlertEvent, FailureKind, IngestReport, ItemFailure, RawReading, Reading};
pub use pipeline::IngestionPipeline;

use simulator::SensorSimulator;
use std::sync::Arc;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<SensorsrvConfig>,
    pub pipeline: Arc<IngestionPipeline>,
    pub simulator: Arc<SensorSimulator>,
}
