//! HistoryStore behavior across backends
//!
//! Covers retention, ordering, per-sensor isolation, concurrent appends and
//! storage timeouts for both the memory and file backends.

#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

use async_trait::async_trait;
use bytes::Bytes;
use city_history::{
    FileKvStore, FixedTimeProvider, HistoryEntry, HistoryStore, KvStore, MemoryKvStore,
    DEFAULT_HISTORY_CAPACITY,
};
use errors::{CityError, CityResult};
use std::sync::Arc;
use std::time::Duration;

fn unique_sensor() -> String {
    format!("sensor_{}", uuid::Uuid::new_v4().simple())
}

async fn backends() -> (Vec<(&'static str, Arc<dyn KvStore>)>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let file = FileKvStore::open(dir.path()).await.unwrap();
    (
        vec![
            ("memory", Arc::new(MemoryKvStore::new()) as Arc<dyn KvStore>),
            ("file", Arc::new(file) as Arc<dyn KvStore>),
        ],
        dir,
    )
}

/// Backend that stalls every operation on keys containing `slow_marker`
struct StallingKvStore {
    inner: MemoryKvStore,
    slow_marker: &'static str,
    delay: Duration,
}

impl StallingKvStore {
    async fn maybe_stall(&self, key: &str) {
        if key.contains(self.slow_marker) {
            tokio::time::sleep(self.delay).await;
        }
    }
}

#[async_trait]
impl KvStore for StallingKvStore {
    fn backend_name(&self) -> &'static str {
        "stalling"
    }

    async fn get(&self, key: &str) -> CityResult<Option<Bytes>> {
        self.maybe_stall(key).await;
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: Bytes) -> CityResult<()> {
        self.maybe_stall(key).await;
        self.inner.put(key, value).await
    }

    async fn delete(&self, key: &str) -> CityResult<bool> {
        self.inner.delete(key).await
    }

    async fn keys_with_prefix(&self, prefix: &str) -> CityResult<Vec<String>> {
        self.inner.keys_with_prefix(prefix).await
    }
}

#[tokio::test]
async fn test_last_n_entries_retained_in_order() {
    let (backends, _dir) = backends().await;
    for (name, backend) in backends {
        let store = HistoryStore::new(backend);
        let sensor = unique_sensor();

        for n in [1usize, 99, 100, 101, 250] {
            let sensor = format!("{}_{}", sensor, n);
            for i in 0..n {
                let entry = HistoryEntry::new(i as i64, i as f64, "AQI");
                store.append_entry(&sensor, entry).await.unwrap();
            }

            let log = store.read(&sensor).await.unwrap();
            let kept = n.min(DEFAULT_HISTORY_CAPACITY);
            assert_eq!(log.len(), kept, "{} backend, n={}", name, n);

            let expected_first = (n - kept) as i64;
            let timestamps: Vec<i64> = log.iter().map(|e| e.timestamp).collect();
            let expected: Vec<i64> = (expected_first..n as i64).collect();
            assert_eq!(timestamps, expected, "{} backend, n={}", name, n);
        }
    }
}

#[tokio::test]
async fn test_custom_capacity() {
    let store = HistoryStore::with_capacity(Arc::new(MemoryKvStore::new()), 3).unwrap();
    for i in 0..5 {
        store
            .append_entry("traffic_002", HistoryEntry::new(i, i as f64, "vehicles/min"))
            .await
            .unwrap();
    }
    let values: Vec<f64> = store
        .read("traffic_002")
        .await
        .unwrap()
        .iter()
        .map(|e| e.value)
        .collect();
    assert_eq!(values, vec![2.0, 3.0, 4.0]);
    assert_eq!(store.capacity(), 3);
}

#[tokio::test]
async fn test_append_uses_injected_clock() {
    let store = HistoryStore::new(Arc::new(MemoryKvStore::new()))
        .with_clock(Arc::new(FixedTimeProvider::new(1_700_000_000_000)));
    let entry = store.append("noise_003", 66.0, "dB").await.unwrap();
    assert_eq!(entry.timestamp, 1_700_000_000_000);
    assert_eq!(store.read("noise_003").await.unwrap(), vec![entry]);
}

#[tokio::test]
async fn test_concurrent_appends_same_sensor_lose_nothing() {
    let (backends, _dir) = backends().await;
    for (name, backend) in backends {
        let store = Arc::new(HistoryStore::new(backend));
        let sensor = unique_sensor();

        let mut handles = Vec::new();
        for i in 0..60 {
            let store = store.clone();
            let sensor = sensor.clone();
            handles.push(tokio::spawn(async move {
                store.append(&sensor, i as f64, "dB").await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let log = store.read(&sensor).await.unwrap();
        assert_eq!(log.len(), 60, "{} backend", name);
        let mut values: Vec<i64> = log.iter().map(|e| e.value as i64).collect();
        values.sort();
        assert_eq!(values, (0..60).collect::<Vec<_>>(), "{} backend", name);
    }
}

#[tokio::test]
async fn test_concurrent_overflow_never_exceeds_capacity() {
    let store = Arc::new(HistoryStore::with_capacity(Arc::new(MemoryKvStore::new()), 10).unwrap());
    let mut handles = Vec::new();
    for i in 0..50 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.append("aq", i as f64, "AQI").await.unwrap();
            assert!(store.len("aq").await.unwrap() <= 10);
        }));
    }
    for h in handles {
        h.await.unwrap();
    }
    assert_eq!(store.len("aq").await.unwrap(), 10);
}

#[tokio::test]
async fn test_slow_sensor_does_not_block_other_sensors() {
    let backend = Arc::new(StallingKvStore {
        inner: MemoryKvStore::new(),
        slow_marker: "slow",
        delay: Duration::from_millis(500),
    });
    let store = Arc::new(HistoryStore::new(backend));

    let slow = {
        let store = store.clone();
        tokio::spawn(async move { store.append("slow_sensor", 1.0, "dB").await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let started = std::time::Instant::now();
    store.append("fast_sensor", 2.0, "dB").await.unwrap();
    assert_eq!(store.read("fast_sensor").await.unwrap().len(), 1);
    assert!(started.elapsed() < Duration::from_millis(250));

    slow.await.unwrap().unwrap();
    assert_eq!(store.read("slow_sensor").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_storage_timeout_commits_nothing() {
    let backend = Arc::new(StallingKvStore {
        inner: MemoryKvStore::new(),
        slow_marker: "stuck",
        delay: Duration::from_secs(5),
    });
    let store = HistoryStore::new(backend.clone()).with_timeout(Duration::from_millis(50));

    let err = store.append("stuck_sensor", 1.0, "dB").await.unwrap_err();
    assert!(matches!(err, CityError::StorageTimeout { .. }));
    assert_eq!(err.status_code(), 504);

    assert_eq!(backend.inner.get("history:stuck_sensor").await.unwrap(), None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_file_timeouts_leave_no_temp_files_or_phantom_entries() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(FileKvStore::open(dir.path()).await.unwrap());
    let store = Arc::new(
        HistoryStore::with_capacity(backend, 500)
            .unwrap()
            .with_timeout(Duration::from_millis(1)),
    );

    let mut handles = Vec::new();
    for i in 0..120 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            (i, store.append("noise_003", i as f64, "dB").await)
        }));
    }

    let mut committed = Vec::new();
    let mut timed_out = Vec::new();
    for h in handles {
        match h.await.unwrap() {
            (i, Ok(_)) => committed.push(i as f64),
            (i, Err(CityError::StorageTimeout { .. })) => timed_out.push(i as f64),
            (i, Err(e)) => panic!("append {} failed: {}", i, e),
        }
    }

    let leftovers: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.unwrap().file_name().into_string().ok())
        .filter(|n| n.contains(".tmp-"))
        .collect();
    assert!(leftovers.is_empty(), "temp files left: {:?}", leftovers);

    let store = HistoryStore::with_capacity(
        Arc::new(FileKvStore::open(dir.path()).await.unwrap()),
        500,
    )
    .unwrap();
    let mut stored: Vec<f64> = store
        .read("noise_003")
        .await
        .unwrap()
        .iter()
        .map(|e| e.value)
        .collect();
    stored.sort_by(f64::total_cmp);
    committed.sort_by(f64::total_cmp);
    assert_eq!(stored, committed);
    assert!(timed_out.iter().all(|v| !stored.contains(v)));
}

#[tokio::test]
async fn test_file_history_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = HistoryStore::new(Arc::new(FileKvStore::open(dir.path()).await.unwrap()));
        store.append("air_quality_001", 120.0, "AQI").await.unwrap();
        store.append("air_quality_001", 130.0, "AQI").await.unwrap();
    }

    let store = HistoryStore::new(Arc::new(FileKvStore::open(dir.path()).await.unwrap()));
    let values: Vec<f64> = store
        .read("air_quality_001")
        .await
        .unwrap()
        .iter()
        .map(|e| e.value)
        .collect();
    assert_eq!(values, vec![120.0, 130.0]);
    assert_eq!(store.sensor_ids().await.unwrap(), vec!["air_quality_001"]);
}

#[tokio::test]
async fn test_record_is_plain_json_array() {
    let backend = Arc::new(MemoryKvStore::new());
    let store = HistoryStore::new(backend.clone());
    store
        .append_entry("noise_003", HistoryEntry::new(5, 70.5, "dB"))
        .await
        .unwrap();

    let raw = backend.get("history:noise_003").await.unwrap().unwrap();
    let json: serde_json::Value = serde_json::from_slice(&raw).unwrap();
    assert_eq!(
        json,
        serde_json::json!([{ "timestamp": 5, "value": 70.5, "unit": "dB" }])
    );
}
