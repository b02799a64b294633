//! # Workflow State
//!
//! Durable status/progress records for orchestration requests, stored through a
//! generic key-value interface with optional TTL.
//!
//! ## Backends
//!
//! - **memory**: in-process, default
//! - **redis**: shared across instances, behind the `state-redis` feature
//! - **none**: persistence disabled; all reads miss

pub mod errors;
pub mod provider;
pub mod providers;
pub mod record;
pub mod store;
pub mod traits;

pub use errors::{StoreError, StoreResult};
pub use provider::StateProvider;
pub use providers::{InMemoryKeyValueStore, NoOpKeyValueStore};
pub use record::{generate_workflow_id, WorkflowRecord, WorkflowStatus, WorkflowUpdate};
pub use store::WorkflowStateStore;
pub use traits::KeyValueStore;

#[cfg(feature = "state-redis")]
pub use providers::RedisKeyValueStore;
