//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Orchestrator asks for a provider (model, excluded set, optional hint)
//!     → router.rs filters the static provider list:
//!         supports(model) AND not excluded AND circuit admits
//!     → Return: highest-priority candidate, or None
//! ```
//!
//! # Design Decisions
//! - Provider list compiled at startup, immutable at runtime
//! - Deterministic: priority order, ties broken by configuration order
//! - No wraparound: once every candidate is excluded, selection ends
//! - Explicit None rather than a silent default

pub mod router;

pub use router::ProviderRouter;
