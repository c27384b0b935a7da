//! Per-provider circuit breaker.
//!
//! # States
//! - Closed: normal operation, attempts pass through
//! - Open: provider assumed down, attempts rejected at selection time
//! - HalfOpen: exactly one probe attempt admitted to test recovery
//!
//! # State Transitions
//! ```text
//! Closed → Open:      consecutive failures >= failure_threshold
//! Open → HalfOpen:    reset_timeout elapsed; the caller that wins the
//!                     race gets the single probe, everyone else sees Open
//! HalfOpen → Closed:  probe succeeded (failure count reset to 0)
//! HalfOpen → Open:    probe failed (timer restarted), or probe abandoned
//!                     with no outcome to record (timer kept)
//! ```
//!
//! # Design Decisions
//! - One entry per provider, each behind its own `std::sync::Mutex`;
//!   provider A's health updates never contend with provider B's
//! - No lock is ever held across an await; the lock guards only the
//!   state transition itself
//! - Transition events are emitted after the entry lock is released

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::CircuitBreakerConfig;
use crate::observability::{CircuitTransition, EventSink};

/// Circuit breaker state for one provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        })
    }
}

#[derive(Debug)]
struct CircuitEntry {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure_at: Option<Instant>,
    opened_at: Option<Instant>,
}

impl CircuitEntry {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            last_failure_at: None,
            opened_at: None,
        }
    }
}

/// Read-only view of one provider's circuit, for diagnostics and tests.
#[derive(Debug, Clone)]
pub struct CircuitSnapshot {
    pub state: CircuitState,
    pub consecutive_failures: u32,
}

/// Process-wide table of per-provider circuit breakers.
///
/// Built once from the static provider list; entries are never added or
/// removed at request time.
pub struct CircuitBreakerRegistry {
    entries: HashMap<String, Mutex<CircuitEntry>>,
    reset_timeout: Duration,
    failure_threshold: u32,
    sink: Arc<dyn EventSink>,
}

impl CircuitBreakerRegistry {
    pub fn new(
        provider_names: impl IntoIterator<Item = String>,
        config: &CircuitBreakerConfig,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let entries = provider_names
            .into_iter()
            .map(|name| (name, Mutex::new(CircuitEntry::new())))
            .collect();
        Self {
            entries,
            reset_timeout: Duration::from_millis(config.reset_timeout_ms),
            failure_threshold: config.failure_threshold,
            sink,
        }
    }

    /// Whether an attempt against `provider` may proceed right now.
    ///
    /// For an Open circuit whose reset timeout has elapsed, the first
    /// caller atomically moves the circuit to HalfOpen and is admitted as
    /// the single probe; concurrent callers in the same window see false.
    pub fn can_execute(&self, provider: &str) -> bool {
        let Some(entry) = self.entries.get(provider) else {
            tracing::debug!(provider = %provider, "Unknown provider in circuit registry");
            return false;
        };

        let transition;
        let admitted;
        {
            let mut entry = lock_entry(entry);
            match entry.state {
                CircuitState::Closed => {
                    admitted = true;
                    transition = None;
                }
                CircuitState::HalfOpen => {
                    // The single probe is already out.
                    admitted = false;
                    transition = None;
                }
                CircuitState::Open => {
                    let elapsed_enough = entry
                        .opened_at
                        .map(|at| at.elapsed() >= self.reset_timeout)
                        .unwrap_or(true);
                    if elapsed_enough {
                        entry.state = CircuitState::HalfOpen;
                        admitted = true;
                        transition = Some(self.transition(
                            provider,
                            CircuitState::Open,
                            CircuitState::HalfOpen,
                            "reset_timeout_elapsed",
                        ));
                    } else {
                        admitted = false;
                        transition = None;
                    }
                }
            }
        }

        if let Some(t) = transition {
            self.sink.circuit_transition(&t);
        }
        admitted
    }

    /// Record a successful attempt against `provider`.
    pub fn record_success(&self, provider: &str) {
        let Some(entry) = self.entries.get(provider) else {
            tracing::warn!(provider = %provider, "Success recorded for unknown provider");
            return;
        };

        let transition;
        {
            let mut entry = lock_entry(entry);
            entry.consecutive_failures = 0;
            transition = if entry.state == CircuitState::HalfOpen {
                entry.state = CircuitState::Closed;
                entry.opened_at = None;
                Some(self.transition(
                    provider,
                    CircuitState::HalfOpen,
                    CircuitState::Closed,
                    "probe_succeeded",
                ))
            } else {
                None
            };
        }

        if let Some(t) = transition {
            self.sink.circuit_transition(&t);
        }
    }

    /// Record a failed attempt against `provider`.
    pub fn record_failure(&self, provider: &str) {
        let Some(entry) = self.entries.get(provider) else {
            tracing::warn!(provider = %provider, "Failure recorded for unknown provider");
            return;
        };

        let transition;
        {
            let mut entry = lock_entry(entry);
            entry.consecutive_failures += 1;
            entry.last_failure_at = Some(Instant::now());
            transition = match entry.state {
                CircuitState::HalfOpen => {
                    entry.state = CircuitState::Open;
                    entry.opened_at = Some(Instant::now());
                    Some(self.transition(
                        provider,
                        CircuitState::HalfOpen,
                        CircuitState::Open,
                        "probe_failed",
                    ))
                }
                CircuitState::Closed if entry.consecutive_failures >= self.failure_threshold => {
                    entry.state = CircuitState::Open;
                    entry.opened_at = Some(Instant::now());
                    Some(self.transition(
                        provider,
                        CircuitState::Closed,
                        CircuitState::Open,
                        "failure_threshold_reached",
                    ))
                }
                _ => None,
            };
        }

        if let Some(t) = transition {
            self.sink.circuit_transition(&t);
        }
    }

    /// Hand back a probe admission whose attempt ended with nothing to
    /// record (the caller cancelled, or the client went away mid-stream).
    ///
    /// Reverts HalfOpen to Open without touching the original timer, so
    /// `can_execute` can admit a fresh probe. An abandoned entry left in
    /// HalfOpen would reject every future attempt with no timer to escape.
    pub fn release_probe(&self, provider: &str) {
        let Some(entry) = self.entries.get(provider) else {
            tracing::warn!(provider = %provider, "Probe released for unknown provider");
            return;
        };

        let transition;
        {
            let mut entry = lock_entry(entry);
            transition = if entry.state == CircuitState::HalfOpen {
                entry.state = CircuitState::Open;
                Some(self.transition(
                    provider,
                    CircuitState::HalfOpen,
                    CircuitState::Open,
                    "probe_abandoned",
                ))
            } else {
                None
            };
        }

        if let Some(t) = transition {
            self.sink.circuit_transition(&t);
        }
    }

    /// Current state of one provider's circuit.
    pub fn snapshot(&self, provider: &str) -> Option<CircuitSnapshot> {
        self.entries.get(provider).map(|entry| {
            let entry = lock_entry(entry);
            CircuitSnapshot {
                state: entry.state,
                consecutive_failures: entry.consecutive_failures,
            }
        })
    }

    fn transition(
        &self,
        provider: &str,
        from: CircuitState,
        to: CircuitState,
        reason: &'static str,
    ) -> CircuitTransition {
        CircuitTransition {
            provider: provider.to_string(),
            from,
            to,
            reason,
            at: chrono::Utc::now(),
        }
    }
}

/// Entry locks are only held for the transition itself, so a poisoned lock
/// means a panic inside this module; recovering the inner state is sound.
fn lock_entry(entry: &Mutex<CircuitEntry>) -> std::sync::MutexGuard<'_, CircuitEntry> {
    entry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
