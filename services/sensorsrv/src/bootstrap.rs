//! Wiring from configuration to a running service state

use crate::config::{SensorsrvConfig, StorageBackend};
use crate::dispatch::{
    AlertDispatcher, AlertProcessor, LogNotifier, NoopDispatcher, Notifier, ProcessorStats,
    QueueDispatcher, WebhookNotifier,
};
use crate::pipeline::IngestionPipeline;
use crate::simulator::SensorSimulator;
use crate::AppState;
use city_history::{FileKvStore, HistoryStore, KvStore, MemoryKvStore};
use errors::{CityError, CityResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Handler state plus the background alert processor
pub struct ServiceRuntime {
    pub state: AppState,
    pub processor: Option<JoinHandle<ProcessorStats>>,
}

impl ServiceRuntime {
    /// Wait for queued alerts to drain after every handle to `state` is gone
    pub async fn drain(processor: Option<JoinHandle<ProcessorStats>>, timeout: Duration) {
        let Some(handle) = processor else {
            return;
        };
        match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(stats)) => info!("Alert queue drained ({} processed)", stats.processed),
            Ok(Err(e)) => warn!("Alert processor task failed: {}", e),
            Err(_) => warn!("Alert queue drain timed out after {:?}", timeout),
        }
    }
}

/// Open the storage backend named by the configuration
pub async fn open_backend(config: &SensorsrvConfig) -> CityResult<Arc<dyn KvStore>> {
    match config.storage.backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryKvStore::new())),
        StorageBackend::File => {
            let dir = config.storage.data_dir.clone().ok_or_else(|| CityError::InvalidConfig {
                field: "storage.data_dir".to_string(),
                reason: "required for the file backend".to_string(),
            })?;
            Ok(Arc::new(FileKvStore::open(dir).await?))
        },
    }
}

/// Build storage, dispatch and pipeline; spawns the alert processor when enabled
///
/// Must be called inside a tokio runtime.
pub async fn build_runtime(config: SensorsrvConfig) -> CityResult<ServiceRuntime> {
    let backend = open_backend(&config).await?;
    let history = HistoryStore::with_capacity(backend, config.storage.history_capacity)?
        .with_timeout(Duration::from_millis(config.storage.timeout_ms));
    info!(
        "History store: {} backend, capacity {}",
        history.backend_name(),
        history.capacity()
    );

    let (dispatcher, processor) = if config.dispatch.enabled {
        let notifier: Arc<dyn Notifier> = match &config.dispatch.notify_endpoint {
            Some(endpoint) => Arc::new(WebhookNotifier::new(
                endpoint.clone(),
                Duration::from_millis(config.dispatch.notify_timeout_ms),
            )?),
            None => Arc::new(LogNotifier),
        };
        info!(
            "Alert dispatch: queue capacity {}, notifier {}",
            config.dispatch.queue_capacity,
            notifier.name()
        );
        let (queue, rx) = QueueDispatcher::channel(config.dispatch.queue_capacity);
        let handle = AlertProcessor::new(notifier).spawn(rx);
        let queue: Arc<dyn AlertDispatcher> = Arc::new(queue);
        (queue, Some(handle))
    } else {
        info!("Alert dispatch disabled");
        let noop: Arc<dyn AlertDispatcher> = Arc::new(NoopDispatcher);
        (noop, None)
    };

    let pipeline = IngestionPipeline::new(
        Arc::new(history),
        Arc::new(config.thresholds.clone()),
        dispatcher,
        Duration::from_millis(config.dispatch.timeout_ms),
    );
    let simulator = SensorSimulator::new(config.sensors.clone());

    Ok(ServiceRuntime {
        state: AppState {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
            simulator: Arc::new(simulator),
        },
        processor,
    })
}
