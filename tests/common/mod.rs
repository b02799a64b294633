//! Shared helpers for integration tests

#![allow(dead_code)]

pub mod builders;
pub mod recording_store;
pub mod strategies;

pub use builders::*;
pub use recording_store::*;
pub use strategies::*;
