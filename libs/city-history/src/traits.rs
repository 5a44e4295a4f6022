//! Trait definitions for the storage backend abstraction

use async_trait::async_trait;
use bytes::Bytes;
use errors::CityResult;

/// Key-value storage backend consumed by `HistoryStore`
///
/// Each key holds one opaque record. Implementations must make `put`
/// atomic per key: a concurrent or interrupted write leaves either the old
/// or the new record, never a mix. No multi-key guarantees are required.
///
/// Implementations:
/// - `MemoryKvStore`: in-memory backend for testing
/// - `FileKvStore`: durable backend, one file per key
#[async_trait]
pub trait KvStore: Send + Sync + 'static {
    /// Short backend name for logs
    fn backend_name(&self) -> &'static str;

    /// Get value by key
    async fn get(&self, key: &str) -> CityResult<Option<Bytes>>;

    /// Replace the value stored under key
    async fn put(&self, key: &str, value: Bytes) -> CityResult<()>;

    /// Delete key, returning whether it existed
    async fn delete(&self, key: &str) -> CityResult<bool>;

    /// List keys starting with prefix (unordered)
    async fn keys_with_prefix(&self, prefix: &str) -> CityResult<Vec<String>>;
}
