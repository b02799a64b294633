use criterion::{black_box, criterion_group, criterion_main, Criterion};
use orchestrator_core::config::StateStoreConfig;
use orchestrator_core::resilience::{backoff_delay, CircuitBreaker, CircuitBreakerConfig, RetryPolicy};
use orchestrator_core::state::{InMemoryKeyValueStore, WorkflowRecord, WorkflowStateStore, WorkflowUpdate};
use tokio::runtime::Runtime;

fn benchmark_backoff_delay(c: &mut Criterion) {
    let policy = RetryPolicy::default();
    c.bench_function("backoff_delay", |b| {
        b.iter(|| backoff_delay(black_box(&policy), black_box(4), black_box(0.37)))
    });
}

fn benchmark_breaker_closed_call(c: &mut Criterion) {
    let rt = Runtime::new().expect("tokio runtime");
    let breaker = CircuitBreaker::new("bench".to_string(), CircuitBreakerConfig::default());
    c.bench_function("circuit_breaker_closed_call", |b| {
        b.iter(|| rt.block_on(breaker.call(|| async { Ok::<_, std::io::Error>(black_box(1)) })))
    });
}

fn benchmark_breaker_open_rejection(c: &mut Criterion) {
    let rt = Runtime::new().expect("tokio runtime");
    let breaker = CircuitBreaker::new("bench".to_string(), CircuitBreakerConfig::default());
    breaker.force_open();
    c.bench_function("circuit_breaker_open_rejection", |b| {
        b.iter(|| rt.block_on(breaker.call(|| async { Ok::<_, std::io::Error>(black_box(1)) })))
    });
}

fn benchmark_state_store_update(c: &mut Criterion) {
    let rt = Runtime::new().expect("tokio runtime");
    let store = WorkflowStateStore::new(InMemoryKeyValueStore::new(), &StateStoreConfig::default());
    let record = WorkflowRecord::new("bench-session");
    rt.block_on(store.create(&record)).expect("create record");

    c.bench_function("state_store_step_update", |b| {
        b.iter(|| {
            rt.block_on(store.update(
                black_box(&record.id),
                &WorkflowUpdate::step_started("content_generation"),
            ))
        })
    });
}

criterion_group!(
    benches,
    benchmark_backoff_delay,
    benchmark_breaker_closed_call,
    benchmark_breaker_open_rejection,
    benchmark_state_store_update
);
criterion_main!(benches);
