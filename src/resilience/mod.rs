//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Attempt outcome (pre-classified FaultKind)
//!     → circuit_breaker.rs (record outcome, open circuit on threshold)
//!     → retries.rs (map kind to retry / failover / abort)
//!     → backoff.rs (compute jittered delay for same-provider retries)
//! ```
//!
//! # Design Decisions
//! - Classification happens once at the adapter boundary; this subsystem
//!   only consumes the typed kind
//! - Circuit state is per provider, never global
//! - Rate limits always fail over with no local wait

pub mod backoff;
pub mod circuit_breaker;
pub mod retries;

pub use circuit_breaker::{CircuitBreakerRegistry, CircuitState};
pub use retries::{RetryDecision, RetryPolicy};
