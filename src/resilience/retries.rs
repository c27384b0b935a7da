//! Retry policy: outcome classification and backoff schedule.
//!
//! # Responsibilities
//! - Map a classified fault to a control-flow decision
//!   (retry same provider / fail over / abort)
//! - Produce the jittered backoff delay for same-provider retries
//!
//! # Design Decisions
//! - Timeouts and server faults retry on the same provider
//! - Rate limits never retry locally; they always fail over immediately
//! - Client faults and malformed responses abort the entire request
//! - Cancellation is handled upstream; it never reaches a retry decision

use std::time::Duration;

use crate::config::RetryConfig;
use crate::error::FaultKind;
use crate::resilience::backoff::{backoff_delay, jittered};

/// What the orchestrator should do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Back off, then try the same provider again.
    RetrySameProvider,
    /// Skip remaining attempts on this provider; move to the next one now.
    Failover,
    /// Abort the whole request; no further providers are tried.
    Abort,
}

/// Classification and backoff policy for one orchestrator instance.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Map a fault kind to a retry decision.
    pub fn decide(&self, kind: FaultKind) -> RetryDecision {
        match kind {
            FaultKind::Timeout | FaultKind::ServerFault => RetryDecision::RetrySameProvider,
            FaultKind::RateLimit => RetryDecision::Failover,
            FaultKind::ClientFault | FaultKind::Malformed | FaultKind::Cancelled => {
                RetryDecision::Abort
            }
        }
    }

    /// Jittered delay before the k-th same-provider retry (k >= 1).
    pub fn backoff(&self, retry: u32) -> Duration {
        jittered(self.backoff_base(retry))
    }

    /// Pre-jitter delay for the k-th same-provider retry.
    pub fn backoff_base(&self, retry: u32) -> Duration {
        backoff_delay(retry, self.config.base_delay_ms, self.config.max_delay_ms)
    }

    pub fn max_attempts_per_provider(&self) -> u32 {
        self.config.max_attempts_per_provider
    }

    pub fn max_total_attempts(&self) -> u32 {
        self.config.max_total_attempts
    }
}
