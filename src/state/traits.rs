//! Key-value store trait definition

use super::errors::StoreResult;
use std::time::Duration;

/// Generic key-value interface backing the workflow state store
///
/// Values are JSON documents stored as text. Implemented by the concrete providers
/// (in-memory, Redis, no-op) and by [`super::StateProvider`], which dispatches to one
/// of them.
pub trait KeyValueStore: Send + Sync {
    /// Returns `Ok(None)` when the key is absent or expired
    fn get(&self, key: &str)
        -> impl std::future::Future<Output = StoreResult<Option<String>>> + Send;

    /// Store a value; without a TTL the value never expires
    fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> impl std::future::Future<Output = StoreResult<()>> + Send;

    fn delete(&self, key: &str) -> impl std::future::Future<Output = StoreResult<()>> + Send;

    fn health_check(&self) -> impl std::future::Future<Output = StoreResult<bool>> + Send;

    fn provider_name(&self) -> &'static str;

    /// Whether state is shared across processes (and involves network calls)
    fn is_distributed(&self) -> bool {
        false
    }
}
