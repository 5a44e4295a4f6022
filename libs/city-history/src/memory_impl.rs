//! In-memory key-value backend
//!
//! Uses DashMap for concurrent access. For tests and for deployments that
//! do not need history to survive a restart.

use crate::traits::KvStore;
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use errors::CityResult;
use std::sync::Arc;

/// In-memory backend with concurrent access support
pub struct MemoryKvStore {
    kv_store: Arc<DashMap<String, Bytes>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self {
            kv_store: Arc::new(DashMap::new()),
        }
    }
}

impl Default for MemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> CityResult<Option<Bytes>> {
        Ok(self.kv_store.get(key).map(|v| v.clone()))
    }

    async fn put(&self, key: &str, value: Bytes) -> CityResult<()> {
        self.kv_store.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> CityResult<bool> {
        Ok(self.kv_store.remove(key).is_some())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> CityResult<Vec<String>> {
        Ok(self
            .kv_store
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect())
    }
}
