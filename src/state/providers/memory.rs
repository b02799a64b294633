//! In-process state provider
//!
//! Records live in a `DashMap` for the lifetime of the process. Expired entries are
//! dropped lazily on read and swept on every health check.

use crate::state::errors::StoreResult;
use crate::state::traits::KeyValueStore;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Shared in-memory key-value store; clones see the same entries
#[derive(Debug, Clone, Default)]
pub struct InMemoryKeyValueStore {
    entries: Arc<DashMap<String, Entry>>,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.iter().filter(|e| !e.is_expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove expired entries, returning how many were dropped
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut purged = 0;
        self.entries.retain(|_, entry| {
            let expired = entry.is_expired(now);
            purged += usize::from(expired);
            !expired
        });
        purged
    }
}

impl KeyValueStore for InMemoryKeyValueStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let now = Instant::now();
        let value = match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => Some(entry.value.clone()),
            Some(_) => None,
            None => return Ok(None),
        };

        if value.is_none() {
            self.entries.remove_if(key, |_, entry| entry.is_expired(now));
            debug!(key = key, "State entry expired");
        }
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()> {
        let entry = Entry {
            value: value.to_string(),
            expires_at: ttl.and_then(|ttl| Instant::now().checked_add(ttl)),
        };
        self.entries.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn health_check(&self) -> StoreResult<bool> {
        let purged = self.purge_expired();
        if purged > 0 {
            debug!(purged = purged, "Expired state entries purged");
        }
        Ok(true)
    }

    fn provider_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = InMemoryKeyValueStore::new();
        assert_eq!(store.get("k").await.unwrap(), None);

        store.set("k", "{\"a\":1}", None).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("{\"a\":1}"));
        assert_eq!(store.len(), 1);

        store.delete("k").await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let store = InMemoryKeyValueStore::new();
        store
            .set("short", "v", Some(Duration::from_millis(20)))
            .await
            .unwrap();
        store.set("long", "v", None).await.unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(store.get("short").await.unwrap(), None);
        assert_eq!(store.get("long").await.unwrap().as_deref(), Some("v"));
        assert_eq!(store.purge_expired(), 0);
    }

    #[tokio::test]
    async fn test_unrepresentable_ttl_never_expires() {
        let store = InMemoryKeyValueStore::new();
        store.set("k", "v", Some(Duration::MAX)).await.unwrap();
        store
            .set("days", "v", Some(Duration::from_secs(u64::MAX)))
            .await
            .unwrap();

        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
        assert_eq!(store.get("days").await.unwrap().as_deref(), Some("v"));
        assert_eq!(store.purge_expired(), 0);
    }

    #[tokio::test]
    async fn test_purge_counts_only_expired_entries() {
        let store = InMemoryKeyValueStore::new();
        store.set("a", "v", Some(Duration::from_millis(5))).await.unwrap();
        store.set("b", "v", Some(Duration::from_millis(5))).await.unwrap();
        store.set("c", "v", None).await.unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(store.purge_expired(), 2);
        assert_eq!(store.purge_expired(), 0);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_health_check_sweeps_expired_entries() {
        let store = InMemoryKeyValueStore::new();
        store.set("a", "v", Some(Duration::from_millis(5))).await.unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(store.health_check().await.unwrap());
        assert_eq!(store.entries.len(), 0);
    }

    #[tokio::test]
    async fn test_clones_share_entries() {
        let store = InMemoryKeyValueStore::new();
        let clone = store.clone();
        store.set("k", "v", None).await.unwrap();
        assert_eq!(clone.get("k").await.unwrap().as_deref(), Some("v"));
    }
}
