//! Structured events emitted by the core.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::resilience::circuit_breaker::CircuitState;
use crate::types::{Attempt, AttemptStatus};

/// One circuit breaker state change.
#[derive(Debug, Clone, Serialize)]
pub struct CircuitTransition {
    pub provider: String,
    pub from: CircuitState,
    pub to: CircuitState,
    /// Why the transition happened, e.g. "failure_threshold_reached".
    pub reason: &'static str,
    pub at: DateTime<Utc>,
}

/// Receiver for the core's structured events.
///
/// Implementations must be cheap and non-blocking; they are called inline
/// on the request path (but never under a circuit entry lock).
pub trait EventSink: Send + Sync {
    fn attempt(&self, attempt: &Attempt);
    fn circuit_transition(&self, transition: &CircuitTransition);
}

/// Default sink: structured logs via `tracing` plus `metrics` updates.
pub struct TracingSink;

impl EventSink for TracingSink {
    fn attempt(&self, attempt: &Attempt) {
        match attempt.status {
            AttemptStatus::Success => {
                tracing::info!(
                    request_id = %attempt.request_id,
                    provider = %attempt.provider,
                    attempt = attempt.attempt_number,
                    latency_ms = attempt.latency_ms,
                    "Attempt succeeded"
                );
            }
            AttemptStatus::Failed => {
                tracing::warn!(
                    request_id = %attempt.request_id,
                    provider = %attempt.provider,
                    attempt = attempt.attempt_number,
                    latency_ms = attempt.latency_ms,
                    kind = attempt.error_kind.map(|k| k.as_str()).unwrap_or("unknown"),
                    error = attempt.error_message.as_deref().unwrap_or(""),
                    "Attempt failed"
                );
            }
        }
        super::metrics::record_attempt(attempt);
    }

    fn circuit_transition(&self, transition: &CircuitTransition) {
        tracing::info!(
            provider = %transition.provider,
            from = %transition.from,
            to = %transition.to,
            reason = transition.reason,
            "Circuit transition"
        );
        super::metrics::record_circuit_state(&transition.provider, transition.to);
    }
}

/// Sink that drops everything. Useful in tests.
pub struct NullSink;

impl EventSink for NullSink {
    fn attempt(&self, _attempt: &Attempt) {}
    fn circuit_transition(&self, _transition: &CircuitTransition) {}
}
