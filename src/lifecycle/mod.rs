//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound transport observes client disconnect or deadline
//!     → CancelHandle::cancel()
//!     → every suspension point in the orchestrator and relay
//!       (provider call, backoff sleep, per-chunk pull) selects against
//!       the Cancellation token and unwinds promptly
//! ```
//!
//! # Design Decisions
//! - One token per request, cloned freely into select! arms
//! - A cancel that fires before a clone subscribes is still observed
//! - Cancellation is never attributed to a provider

pub mod cancel;

pub use cancel::{CancelHandle, Cancellation};
