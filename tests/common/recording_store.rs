//! Key-value stores for asserting on persisted progress and on backend outages

use orchestrator_core::state::{
    InMemoryKeyValueStore, KeyValueStore, StoreError, StoreResult, WorkflowRecord,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct RecordingStore {
    inner: InMemoryKeyValueStore,
    writes: Arc<Mutex<Vec<(String, String)>>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every record written under `key`, oldest first
    pub fn history(&self, key: &str) -> Vec<WorkflowRecord> {
        self.writes
            .lock()
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| serde_json::from_str(v).expect("stored record is valid JSON"))
            .collect()
    }
}

impl KeyValueStore for RecordingStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()> {
        self.writes.lock().push((key.to_string(), value.to_string()));
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.inner.delete(key).await
    }

    async fn health_check(&self) -> StoreResult<bool> {
        Ok(true)
    }

    fn provider_name(&self) -> &'static str {
        "recording"
    }
}

/// Backend that refuses every call, counting how often it was asked
#[derive(Debug, Clone, Default)]
pub struct UnavailableStore {
    calls: Arc<AtomicUsize>,
}

impl UnavailableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn refuse<T>(&self) -> StoreResult<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::ConnectionError("connection refused".to_string()))
    }
}

impl KeyValueStore for UnavailableStore {
    async fn get(&self, _key: &str) -> StoreResult<Option<String>> {
        self.refuse()
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Option<Duration>) -> StoreResult<()> {
        self.refuse()
    }

    async fn delete(&self, _key: &str) -> StoreResult<()> {
        self.refuse()
    }

    async fn health_check(&self) -> StoreResult<bool> {
        self.refuse()
    }

    fn provider_name(&self) -> &'static str {
        "unavailable"
    }
}
