//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Orchestrator / CircuitBreakerRegistry produce:
//!     → events.rs (one structured event per attempt and per circuit
//!       transition, handed to an EventSink)
//!     → metrics.rs (counters, gauges, histograms via the metrics facade)
//!
//! Consumers:
//!     → Log aggregation (whatever tracing subscriber the host installs)
//!     → Metrics recorder (whatever exporter the host installs)
//! ```
//!
//! # Design Decisions
//! - The core emits events; formatting, aggregation, and export happen
//!   outside this crate
//! - Metric updates are cheap (facade macros over atomic recorders)
//! - The sink is a trait so tests can capture events without a subscriber

pub mod events;
pub mod metrics;

pub use events::{CircuitTransition, EventSink, NullSink, TracingSink};
