//! Metrics recording.
//!
//! # Metrics
//! - `gateway_attempts_total` (counter): attempts by provider, status, kind
//! - `gateway_attempt_duration_seconds` (histogram): per-attempt latency
//! - `gateway_circuit_state` (gauge): 0=closed, 1=half_open, 2=open
//!
//! # Design Decisions
//! - This module only records through the `metrics` facade; the host process
//!   decides whether a recorder/exporter is installed
//! - Labels are provider, status, and fault kind only (bounded cardinality)

use crate::resilience::circuit_breaker::CircuitState;
use crate::types::{Attempt, AttemptStatus};

/// Record one attempt outcome.
pub fn record_attempt(attempt: &Attempt) {
    let status = match attempt.status {
        AttemptStatus::Success => "success",
        AttemptStatus::Failed => "failed",
    };
    let kind = attempt
        .error_kind
        .map(|k| k.as_str())
        .unwrap_or("none");

    metrics::counter!(
        "gateway_attempts_total",
        "provider" => attempt.provider.clone(),
        "status" => status,
        "kind" => kind,
    )
    .increment(1);

    metrics::histogram!(
        "gateway_attempt_duration_seconds",
        "provider" => attempt.provider.clone(),
    )
    .record(attempt.latency_ms as f64 / 1000.0);
}

/// Record a provider's current circuit state.
pub fn record_circuit_state(provider: &str, state: CircuitState) {
    let value = match state {
        CircuitState::Closed => 0.0,
        CircuitState::HalfOpen => 1.0,
        CircuitState::Open => 2.0,
    };
    metrics::gauge!(
        "gateway_circuit_state",
        "provider" => provider.to_string(),
    )
    .set(value);
}
