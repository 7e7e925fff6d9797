//! 分发相关的指标

use std::time::Duration;

use metrics::{counter, histogram};

pub fn record_dispatch(capability: &str, outcome: &'static str, elapsed: Duration) {
    counter!(
        "gateway_dispatch_total",
        "capability" => capability.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!(
        "gateway_dispatch_duration_ms",
        "capability" => capability.to_string()
    )
    .record(elapsed.as_millis() as f64);
}

pub fn record_attempt(endpoint: &str) {
    counter!("gateway_dispatch_attempts_total", "endpoint" => endpoint.to_string()).increment(1);
}

pub fn record_retry(endpoint: &str) {
    counter!("gateway_dispatch_retries_total", "endpoint" => endpoint.to_string()).increment(1);
}

pub fn record_circuit_transition(endpoint: &str, to: &'static str) {
    counter!(
        "gateway_circuit_transitions_total",
        "endpoint" => endpoint.to_string(),
        "to" => to
    )
    .increment(1);
}

pub fn record_pool_timeout(endpoint: &str) {
    counter!("gateway_pool_wait_timeouts_total", "endpoint" => endpoint.to_string())
        .increment(1);
}

pub fn record_publish(event_type: &str, outcome: &'static str, elapsed: Duration) {
    counter!(
        "gateway_publish_total",
        "event_type" => event_type.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!("gateway_publish_duration_ms").record(elapsed.as_millis() as f64);
}
