//! # Workflow State Store
//!
//! Workflow records persisted as JSON under `"{key_prefix}:{workflow_id}"` in a
//! [`KeyValueStore`]. Every call is bounded by the configured operation timeout.

use super::errors::{StoreError, StoreResult};
use super::provider::StateProvider;
use super::record::{WorkflowRecord, WorkflowUpdate};
use super::traits::KeyValueStore;
use crate::config::StateStoreConfig;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct WorkflowStateStore<S = StateProvider> {
    kv: S,
    key_prefix: String,
    ttl: Option<Duration>,
    operation_timeout: Duration,
}

impl<S: KeyValueStore> WorkflowStateStore<S> {
    pub fn new(kv: S, config: &StateStoreConfig) -> Self {
        Self {
            kv,
            key_prefix: config.key_prefix.clone(),
            ttl: config.ttl(),
            operation_timeout: config.operation_timeout(),
        }
    }

    /// Underlying key-value backend
    pub fn backend(&self) -> &S {
        &self.kv
    }

    pub fn key_for(&self, workflow_id: &str) -> String {
        format!("{}:{}", self.key_prefix, workflow_id)
    }

    /// Persist a new record
    pub async fn create(&self, record: &WorkflowRecord) -> StoreResult<()> {
        let key = self.key_for(&record.id);
        let value = serde_json::to_string(record)?;
        self.bounded("create", self.kv.set(&key, &value, self.ttl))
            .await?;
        debug!(workflow_id = %record.id, session_id = %record.session_id, "Workflow record created");
        Ok(())
    }

    /// Fetch a record; `Ok(None)` when it does not exist
    pub async fn get(&self, workflow_id: &str) -> StoreResult<Option<WorkflowRecord>> {
        let key = self.key_for(workflow_id);
        match self.bounded("get", self.kv.get(&key)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Read-modify-write of the status fields.
    ///
    /// Returns the stored record after the update, or `None` when nothing was
    /// written: the record is missing, or it is already terminal.
    pub async fn update(
        &self,
        workflow_id: &str,
        update: &WorkflowUpdate,
    ) -> StoreResult<Option<WorkflowRecord>> {
        let Some(mut record) = self.get(workflow_id).await? else {
            warn!(
                workflow_id = workflow_id,
                status = %update.status,
                "Workflow record not found, update skipped"
            );
            return Ok(None);
        };

        if !record.apply(update) {
            warn!(
                workflow_id = workflow_id,
                current_status = %record.status,
                requested_status = %update.status,
                "Workflow record is terminal, update skipped"
            );
            return Ok(None);
        }

        let key = self.key_for(workflow_id);
        let value = serde_json::to_string(&record)?;
        self.bounded("update", self.kv.set(&key, &value, self.ttl))
            .await?;

        debug!(
            workflow_id = workflow_id,
            status = %record.status,
            progress = record.progress,
            current_step = %record.current_step,
            "Workflow record updated"
        );
        Ok(Some(record))
    }

    /// Whether the backend answers within the operation timeout
    pub async fn health_check(&self) -> StoreResult<bool> {
        self.bounded("health_check", self.kv.health_check()).await
    }

    async fn bounded<T>(
        &self,
        operation: &str,
        fut: impl Future<Output = StoreResult<T>>,
    ) -> StoreResult<T> {
        match tokio::time::timeout(self.operation_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(format!(
                "{operation} exceeded {}ms",
                self.operation_timeout.as_millis()
            ))),
        }
    }
}
