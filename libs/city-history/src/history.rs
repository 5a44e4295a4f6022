//! Bounded per-sensor reading history
//!
//! Each sensor owns one record (`history:{sensor_id}`) holding its most recent
//! readings, oldest first. Appends for the same sensor are serialized through
//! a per-sensor async mutex; different sensors never share a lock, so writers
//! on sensor A neither block nor observe writers on sensor B.
//!
//! ```text
//! append(id, value, unit)
//!   └─ spawn write task ── lock partition(id)
//!        ├─ get   history:{id}   → [e0, e1, …, eN]
//!        ├─ push  eN+1, evict front while len > capacity
//!        ├─ gate  PENDING → COMMITTING   (or stop if ABANDONED)
//!        └─ put   history:{id}   ← [e1, …, eN+1]
//! ```
//!
//! The write task owns the partition lock until `put` finishes, so a caller
//! that gives up never releases the lock under a write still in flight. When
//! the storage timeout fires, the caller tries to flip the gate from PENDING
//! to ABANDONED: success means nothing will be written and the append reports
//! `StorageTimeout`; failure means the write already started, and the caller
//! waits for its real outcome instead. An append future dropped mid-wait
//! abandons its write the same way.

use crate::keyspace::{history_key, sensor_id_from_key, HISTORY_KEY_PREFIX};
use crate::time::{SystemTimeProvider, TimeProvider};
use crate::traits::KvStore;
use bytes::Bytes;
use dashmap::DashMap;
use errors::{CityError, CityResult};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

const GATE_PENDING: u8 = 0;
const GATE_COMMITTING: u8 = 1;
const GATE_ABANDONED: u8 = 2;

/// Entries retained per sensor unless configured otherwise
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// One stored reading, keyed externally by sensor id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Epoch milliseconds
    pub timestamp: i64,
    pub value: f64,
    pub unit: String,
}

impl HistoryEntry {
    pub fn new(timestamp: i64, value: f64, unit: impl Into<String>) -> Self {
        Self {
            timestamp,
            value,
            unit: unit.into(),
        }
    }
}

/// Per-sensor bounded log over a `KvStore` backend
pub struct HistoryStore {
    backend: Arc<dyn KvStore>,
    clock: Arc<dyn TimeProvider>,
    capacity: usize,
    op_timeout: Option<Duration>,
    partitions: DashMap<String, Arc<Mutex<()>>>,
}

impl HistoryStore {
    /// Store with the default capacity, system clock and no storage timeout
    pub fn new(backend: Arc<dyn KvStore>) -> Self {
        Self {
            backend,
            clock: Arc::new(SystemTimeProvider),
            capacity: DEFAULT_HISTORY_CAPACITY,
            op_timeout: None,
            partitions: DashMap::new(),
        }
    }

    /// Store retaining at most `capacity` entries per sensor
    pub fn with_capacity(backend: Arc<dyn KvStore>, capacity: usize) -> CityResult<Self> {
        if capacity == 0 {
            return Err(CityError::InvalidParameter {
                param: "capacity".to_string(),
                reason: "history capacity must be at least 1".to_string(),
            });
        }
        let mut store = Self::new(backend);
        store.capacity = capacity;
        Ok(store)
    }

    /// Replace the clock used by `append`
    pub fn with_clock(mut self, clock: Arc<dyn TimeProvider>) -> Self {
        self.clock = clock;
        self
    }

    /// Bound every storage round trip by `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.op_timeout = Some(timeout);
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.backend_name()
    }

    /// Append a reading stamped with the store's clock
    pub async fn append(&self, sensor_id: &str, value: f64, unit: &str) -> CityResult<HistoryEntry> {
        let entry = HistoryEntry::new(self.clock.now_millis(), value, unit);
        self.append_entry(sensor_id, entry.clone()).await?;
        Ok(entry)
    }

    /// Append a caller-stamped entry, returning the log length afterwards
    ///
    /// The log is persisted before this returns `Ok`. `StorageTimeout` is
    /// returned only when the write was abandoned before reaching the
    /// backend, so the record keeps its previous contents. A write that had
    /// already started is waited for and its own result returned.
    pub async fn append_entry(&self, sensor_id: &str, entry: HistoryEntry) -> CityResult<usize> {
        validate_sensor_id(sensor_id)?;
        if !entry.value.is_finite() {
            return Err(CityError::InvalidParameter {
                param: "value".to_string(),
                reason: format!("reading value must be finite, got {}", entry.value),
            });
        }

        let key = history_key(sensor_id);
        let gate = CommitGate::new();
        let mut task = tokio::spawn(write_record(
            self.partition(sensor_id),
            Arc::clone(&self.backend),
            key.clone(),
            entry,
            self.capacity,
            gate.handle(),
        ));

        let Some(limit) = self.op_timeout else {
            return join_write(&key, task.await);
        };
        let waited = tokio::time::timeout(limit, &mut task).await;
        if let Ok(joined) = waited {
            return join_write(&key, joined);
        }

        if gate.abandon() {
            let timeout_ms = limit.as_millis() as u64;
            debug!(key = key.as_str(), timeout_ms, "Storage timeout");
            return Err(CityError::StorageTimeout { key, timeout_ms });
        }
        debug!(
            key = key.as_str(),
            "Storage timeout after commit started, awaiting result"
        );
        join_write(&key, task.await)
    }

    /// Current log for a sensor, oldest first; empty if never written
    pub async fn read(&self, sensor_id: &str) -> CityResult<Vec<HistoryEntry>> {
        let key = history_key(sensor_id);
        let log = self.bounded(&key, load(self.backend.as_ref(), &key)).await?;
        Ok(log.into())
    }

    /// Number of entries retained for a sensor
    pub async fn len(&self, sensor_id: &str) -> CityResult<usize> {
        Ok(self.read(sensor_id).await?.len())
    }

    /// Sensors that have a stored log, sorted
    pub async fn sensor_ids(&self) -> CityResult<Vec<String>> {
        let keys = self
            .bounded(HISTORY_KEY_PREFIX, self.backend.keys_with_prefix(HISTORY_KEY_PREFIX))
            .await?;
        let mut ids: Vec<String> = keys
            .iter()
            .filter_map(|k| sensor_id_from_key(k))
            .map(str::to_string)
            .collect();
        ids.sort();
        Ok(ids)
    }

    fn partition(&self, sensor_id: &str) -> Arc<Mutex<()>> {
        // Clone the Arc out so no DashMap shard guard is held across an await
        self.partitions
            .entry(sensor_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }

    async fn bounded<T, F>(&self, key: &str, op: F) -> CityResult<T>
    where
        F: Future<Output = CityResult<T>>,
    {
        let Some(limit) = self.op_timeout else {
            return op.await;
        };
        match tokio::time::timeout(limit, op).await {
            Ok(result) => result,
            Err(_) => {
                debug!(key, timeout_ms = limit.as_millis() as u64, "Storage timeout");
                Err(CityError::StorageTimeout {
                    key: key.to_string(),
                    timeout_ms: limit.as_millis() as u64,
                })
            },
        }
    }
}

/// Commit state shared between an append and its write task
///
/// Dropping the gate abandons a write that has not reached the backend, so
/// a cancelled append leaves the record as it was.
struct CommitGate(Arc<AtomicU8>);

impl CommitGate {
    fn new() -> Self {
        Self(Arc::new(AtomicU8::new(GATE_PENDING)))
    }

    fn handle(&self) -> Arc<AtomicU8> {
        Arc::clone(&self.0)
    }

    /// True if the write was stopped before it started committing
    fn abandon(&self) -> bool {
        self.0
            .compare_exchange(
                GATE_PENDING,
                GATE_ABANDONED,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

impl Drop for CommitGate {
    fn drop(&mut self) {
        self.abandon();
    }
}

fn join_write(
    key: &str,
    joined: Result<CityResult<usize>, tokio::task::JoinError>,
) -> CityResult<usize> {
    joined.map_err(|e| {
        warn!(key, "History write task failed: {}", e);
        CityError::Storage(format!("history write for {} failed: {}", key, e))
    })?
}

/// Read-modify-write of one record under its partition lock
///
/// Runs as its own task so the lock is held until `put` resolves, however
/// long the caller waits.
async fn write_record(
    partition: Arc<Mutex<()>>,
    backend: Arc<dyn KvStore>,
    key: String,
    entry: HistoryEntry,
    capacity: usize,
    gate: Arc<AtomicU8>,
) -> CityResult<usize> {
    let _guard = partition.lock().await;

    let mut log = load(backend.as_ref(), &key).await?;
    log.push_back(entry);
    while log.len() > capacity {
        log.pop_front();
    }
    let encoded = serde_json::to_vec(&log)?;

    if gate
        .compare_exchange(
            GATE_PENDING,
            GATE_COMMITTING,
            Ordering::AcqRel,
            Ordering::Acquire,
        )
        .is_err()
    {
        trace!(key = key.as_str(), "History write abandoned before commit");
        return Err(CityError::StorageTimeout { key, timeout_ms: 0 });
    }

    backend.put(&key, Bytes::from(encoded)).await?;
    trace!(key = key.as_str(), len = log.len(), "History appended");
    Ok(log.len())
}

async fn load(backend: &dyn KvStore, key: &str) -> CityResult<VecDeque<HistoryEntry>> {
    match backend.get(key).await? {
        None => Ok(VecDeque::new()),
        Some(raw) => serde_json::from_slice(&raw).map_err(|e| CityError::CorruptedRecord {
            key: key.to_string(),
            reason: e.to_string(),
        }),
    }
}

fn validate_sensor_id(sensor_id: &str) -> CityResult<()> {
    if sensor_id.is_empty() {
        return Err(CityError::InvalidParameter {
            param: "sensor_id".to_string(),
            reason: "must not be empty".to_string(),
        });
    }
    Ok(())
}
