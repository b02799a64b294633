//! Key-value provider implementations

pub mod memory;
pub mod noop;

#[cfg(feature = "state-redis")]
pub mod redis;

pub use memory::InMemoryKeyValueStore;
pub use noop::NoOpKeyValueStore;

#[cfg(feature = "state-redis")]
pub use self::redis::RedisKeyValueStore;
