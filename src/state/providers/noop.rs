//! No-op state provider
//!
//! Always returns None/success. Used when persistence is disabled or when the
//! configured backend is unreachable at startup.

use crate::state::errors::StoreResult;
use crate::state::traits::KeyValueStore;
use std::time::Duration;

/// All reads miss, all writes succeed silently
#[derive(Debug, Clone, Default)]
pub struct NoOpKeyValueStore;

impl NoOpKeyValueStore {
    pub fn new() -> Self {
        Self
    }
}

impl KeyValueStore for NoOpKeyValueStore {
    async fn get(&self, _key: &str) -> StoreResult<Option<String>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Option<Duration>) -> StoreResult<()> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> StoreResult<()> {
        Ok(())
    }

    async fn health_check(&self) -> StoreResult<bool> {
        Ok(true)
    }

    fn provider_name(&self) -> &'static str {
        "noop"
    }
}
