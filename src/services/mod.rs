//! # Downstream Services
//!
//! HTTP access to the services a pipeline calls, wrapped in per-service circuit
//! breakers and bounded retry.

pub mod errors;
pub mod health;
pub mod invoker;
pub mod transport;

pub use errors::ServiceCallError;
pub use health::ServiceHealth;
pub use invoker::ServiceInvoker;
pub use transport::{query_pairs, DownstreamTransport, HttpMethod, HttpTransport, ServiceRequest};
