//! Reliability core for fanning chat completion requests across
//! interchangeable LLM providers.
//!
//! # Architecture Overview
//!
//! ```text
//! Validated request (from inbound transport)
//!     → orchestrator (attempt loop, attempt history, budget)
//!         → routing (model → eligible provider, priority order)
//!         → resilience (circuit breaker, retry policy, backoff)
//!         → provider adapter (opaque remote call, pre-classified faults)
//!         → relay (streaming: forward chunks, detect stalls/malformed data)
//!     → Completion, or a terminal failure with the full attempt history
//!
//! Cross-cutting: config (TOML, validated), lifecycle (cancellation),
//! observability (structured events, metrics)
//! ```
//!
//! Inbound transport/framing, request validation, concrete provider
//! adapters, and metrics/log export are the host process's concern; this
//! crate only turns unreliable upstream calls into a dependable one with
//! bounded failure behavior.

// Core subsystems
pub mod config;
pub mod orchestrator;
pub mod provider;
pub mod relay;
pub mod resilience;
pub mod routing;

// Data model & errors
pub mod error;
pub mod types;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::GatewayConfig;
pub use error::{FaultKind, GatewayFailure, ProviderFault, TerminalError};
pub use lifecycle::{CancelHandle, Cancellation};
pub use orchestrator::Orchestrator;
pub use provider::{ChunkSource, ProviderAdapter, ProviderDescriptor, StreamItem};
pub use types::{Attempt, ChatRequest, Completion, Message};
