//! Provider boundary.
//!
//! # Data Flow
//! ```text
//! Orchestrator selects a ProviderDescriptor
//!     → looks up the registered ProviderAdapter by name
//!     → complete() for buffered requests
//!     → open_stream() for streaming requests → ChunkSource pulled by relay
//!     → success payload, or a ProviderFault classified at this boundary
//! ```
//!
//! # Design Decisions
//! - The provider itself is opaque; adapters own the remote protocol and
//!   return pre-classified faults. Nothing downstream inspects error text.
//! - Streaming is a pull-based typed sequence, not callbacks. Suspension
//!   happens at each `next()` call; dropping the source cancels the
//!   upstream read.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderFault;
use crate::types::ChatRequest;

/// Static description of one configured provider.
///
/// Read-only at request time; loaded from configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    /// Unique provider name, e.g. "openai".
    pub name: String,

    /// Endpoint reference handed to the adapter verbatim.
    pub endpoint: String,

    /// Models this provider can serve.
    pub models: Vec<String>,

    /// Priority rank; lower is preferred. Ties break in config order.
    #[serde(default)]
    pub priority: u32,
}

impl ProviderDescriptor {
    pub fn supports(&self, model: &str) -> bool {
        self.models.iter().any(|m| m == model)
    }
}

/// Parsed success payload from a buffered completion call.
#[derive(Debug, Clone)]
pub struct ProviderSuccess {
    pub content: String,
    pub tokens_used: Option<u32>,
}

/// One item pulled from a provider's chunk source.
#[derive(Debug, Clone)]
pub enum StreamItem {
    /// Raw chunk payload; must parse as a delta frame.
    Chunk(String),
    /// Explicit completion sentinel.
    Done,
    /// Upstream error, pre-classified by the adapter.
    Fault(ProviderFault),
}

/// Pull-based source of streaming chunks for one in-flight request.
#[async_trait]
pub trait ChunkSource: Send {
    /// Pull the next item. Suspends until the provider produces data;
    /// yields `Done` exactly once, after which behavior is unspecified.
    async fn next(&mut self) -> StreamItem;
}

/// Adapter for one remote provider. One implementation per provider;
/// registered with the orchestrator under the descriptor's name.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Perform a buffered completion call.
    async fn complete(
        &self,
        descriptor: &ProviderDescriptor,
        request: &ChatRequest,
    ) -> Result<ProviderSuccess, ProviderFault>;

    /// Establish a streaming completion. A returned source means the
    /// connection succeeded; everything after that is the relay's problem.
    async fn open_stream(
        &self,
        descriptor: &ProviderDescriptor,
        request: &ChatRequest,
    ) -> Result<Box<dyn ChunkSource>, ProviderFault>;
}
