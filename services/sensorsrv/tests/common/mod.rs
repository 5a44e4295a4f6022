//! Common test utilities and helpers

#![allow(dead_code)]
#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

use async_trait::async_trait;
use city_history::{Bytes, HistoryStore, KvStore, MemoryKvStore};
use errors::{CityError, CityResult};
use sensorsrv::{
    api::create_router,
    config::{SensorsrvConfig, StorageBackend},
    dispatch::{AlertDispatcher, NoopDispatcher},
    simulator::SensorSimulator,
    AlertEvent, AppState, IngestionPipeline,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ==================== Dispatchers ====================

/// Records every alert it accepts
#[derive(Default)]
pub struct RecordingDispatcher {
    pub alerts: Mutex<Vec<AlertEvent>>,
}

impl RecordingDispatcher {
    pub fn recorded(&self) -> Vec<AlertEvent> {
        self.alerts.lock().unwrap().clone()
    }

    /// Wait until at least `count` alerts arrived, giving up after two seconds
    pub async fn wait_for(&self, count: usize) -> Vec<AlertEvent> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            let recorded = self.recorded();
            if recorded.len() >= count || tokio::time::Instant::now() >= deadline {
                return recorded;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[async_trait]
impl AlertDispatcher for RecordingDispatcher {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn dispatch(&self, alert: &AlertEvent) -> CityResult<()> {
        self.alerts.lock().unwrap().push(alert.clone());
        Ok(())
    }
}

/// Rejects every alert
pub struct FailingDispatcher;

#[async_trait]
impl AlertDispatcher for FailingDispatcher {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn dispatch(&self, _alert: &AlertEvent) -> CityResult<()> {
        Err(CityError::Dispatch("channel unavailable".into()))
    }
}

/// Never completes a dispatch
pub struct HangingDispatcher;

#[async_trait]
impl AlertDispatcher for HangingDispatcher {
    fn name(&self) -> &'static str {
        "hanging"
    }

    async fn dispatch(&self, _alert: &AlertEvent) -> CityResult<()> {
        std::future::pending::<()>().await;
        Ok(())
    }
}

// ==================== Storage backends ====================

/// Memory backend whose writes fail for sensor ids containing `marker`
pub struct FailingKvStore {
    pub inner: MemoryKvStore,
    pub marker: &'static str,
}

impl FailingKvStore {
    pub fn new(marker: &'static str) -> Self {
        Self {
            inner: MemoryKvStore::new(),
            marker,
        }
    }
}

#[async_trait]
impl KvStore for FailingKvStore {
    fn backend_name(&self) -> &'static str {
        "failing"
    }

    async fn get(&self, key: &str) -> CityResult<Option<Bytes>> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: Bytes) -> CityResult<()> {
        if key.contains(self.marker) {
            return Err(CityError::Storage(format!("disk full writing {}", key)));
        }
        self.inner.put(key, value).await
    }

    async fn delete(&self, key: &str) -> CityResult<bool> {
        self.inner.delete(key).await
    }

    async fn keys_with_prefix(&self, prefix: &str) -> CityResult<Vec<String>> {
        self.inner.keys_with_prefix(prefix).await
    }
}

/// Memory backend that delays every read and write
pub struct SlowKvStore {
    pub inner: MemoryKvStore,
    pub delay: Duration,
}

#[async_trait]
impl KvStore for SlowKvStore {
    fn backend_name(&self) -> &'static str {
        "slow"
    }

    async fn get(&self, key: &str) -> CityResult<Option<Bytes>> {
        tokio::time::sleep(self.delay).await;
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: Bytes) -> CityResult<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.put(key, value).await
    }

    async fn delete(&self, key: &str) -> CityResult<bool> {
        self.inner.delete(key).await
    }

    async fn keys_with_prefix(&self, prefix: &str) -> CityResult<Vec<String>> {
        self.inner.keys_with_prefix(prefix).await
    }
}

// ==================== State builders ====================

/// City defaults on an in-memory backend
pub fn test_config() -> SensorsrvConfig {
    let mut config = SensorsrvConfig::city_defaults();
    config.storage.backend = StorageBackend::Memory;
    config.storage.data_dir = None;
    config
}

pub fn create_pipeline(
    backend: Arc<dyn KvStore>,
    dispatcher: Arc<dyn AlertDispatcher>,
    config: &SensorsrvConfig,
) -> IngestionPipeline {
    let history = HistoryStore::with_capacity(backend, config.storage.history_capacity).unwrap();
    IngestionPipeline::new(
        Arc::new(history),
        Arc::new(config.thresholds.clone()),
        dispatcher,
        Duration::from_millis(config.dispatch.timeout_ms),
    )
}

pub fn create_test_state_with(
    backend: Arc<dyn KvStore>,
    dispatcher: Arc<dyn AlertDispatcher>,
    config: SensorsrvConfig,
) -> AppState {
    let pipeline = create_pipeline(backend, dispatcher, &config);
    AppState {
        simulator: Arc::new(SensorSimulator::new(config.sensors.clone())),
        config: Arc::new(config),
        pipeline: Arc::new(pipeline),
    }
}

/// Create a test app state with memory storage and no dispatch
pub fn create_test_state() -> AppState {
    create_test_state_with(
        Arc::new(MemoryKvStore::new()),
        Arc::new(NoopDispatcher),
        test_config(),
    )
}

/// Create a test router for API testing
pub fn create_test_router() -> axum::Router {
    create_router(create_test_state())
}
