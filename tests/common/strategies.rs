//! proptest strategies

use orchestrator_core::resilience::RetryPolicy;
use proptest::prelude::*;
use std::time::Duration;

/// Policies with `base_delay <= max_delay`
pub fn retry_policy_strategy() -> impl Strategy<Value = RetryPolicy> {
    (0u32..10, 1u64..5_000, 0u64..120_000).prop_map(|(max_retries, base_ms, extra_ms)| RetryPolicy {
        max_retries,
        base_delay: Duration::from_millis(base_ms),
        max_delay: Duration::from_millis(base_ms + extra_ms),
    })
}

/// Progress values including out-of-range ones
pub fn progress_strategy() -> impl Strategy<Value = f64> {
    prop_oneof![
        0.0f64..=1.0,
        -10.0f64..0.0,
        1.0f64..10.0,
    ]
}
