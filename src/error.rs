//! Error taxonomy for the gateway core.
//!
//! # Design Decisions
//! - Failures are classified exactly once, at the provider adapter boundary,
//!   into a [`FaultKind`] tag. Downstream code matches on the tag; nothing
//!   ever re-inspects error text.
//! - Every terminal failure carries the full attempt history so the caller
//!   can see which providers were tried and why each failed.
//! - Cancellation is a distinct kind: it is never attributed to a provider.

use serde::Serialize;

use crate::types::Attempt;

/// Classification of a failed provider interaction.
///
/// Assigned by the provider adapter (or by the relay for stream-local
/// conditions) and carried forward as structured data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// Connection or read timeout.
    Timeout,
    /// 5xx-equivalent server fault.
    ServerFault,
    /// Explicit rate-limit/overload signal.
    RateLimit,
    /// Bad-request/unauthorized-equivalent; the request itself is at fault.
    ClientFault,
    /// Structurally invalid response data.
    Malformed,
    /// The caller went away; not a provider fault.
    Cancelled,
}

impl FaultKind {
    /// Stable label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultKind::Timeout => "timeout",
            FaultKind::ServerFault => "server_fault",
            FaultKind::RateLimit => "rate_limit",
            FaultKind::ClientFault => "client_fault",
            FaultKind::Malformed => "malformed",
            FaultKind::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for FaultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single failed provider interaction, pre-classified at the boundary.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ProviderFault {
    pub kind: FaultKind,
    pub message: String,
}

impl ProviderFault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// The last classified error of a request that could not be resolved.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TerminalError {
    /// Every candidate provider was excluded, unsupported, or circuit-open.
    #[error("no provider available for model '{model}'")]
    NoProviderAvailable { model: String },

    /// The global attempt budget ran out before any provider succeeded.
    #[error("attempt budget exhausted after {attempts} attempts")]
    ExhaustedRetries { attempts: u32 },

    /// A provider returned a non-retryable fault; the request is at fault.
    #[error("provider '{provider}' rejected the request ({kind}): {message}")]
    NonRetryable {
        provider: String,
        kind: FaultKind,
        message: String,
    },

    /// The stream went silent after content had been delivered.
    #[error("stream from '{provider}' stalled after {idle_ms}ms of silence")]
    StreamStalled {
        provider: String,
        idle_ms: u64,
        partial_content: String,
    },

    /// A chunk failed to parse after content had been delivered.
    #[error("stream from '{provider}' produced a malformed chunk: {detail}")]
    StreamMalformed {
        provider: String,
        detail: String,
        partial_content: String,
    },

    /// The upstream failed mid-stream after content had been delivered.
    #[error("stream from '{provider}' failed after delivery ({kind}): {message}")]
    StreamInterrupted {
        provider: String,
        kind: FaultKind,
        message: String,
        partial_content: String,
    },

    /// The caller disconnected mid-stream; the upstream read was cancelled.
    #[error("client aborted while streaming")]
    ClientAborted { partial_content: String },

    /// The caller cancelled while an attempt was in flight.
    #[error("request cancelled by the caller")]
    Cancelled,
}

/// Terminal failure returned to the caller: the last classified error plus
/// the full attempt history.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{error}")]
pub struct GatewayFailure {
    pub error: TerminalError,
    pub attempts: Vec<Attempt>,
}

impl GatewayFailure {
    pub fn new(error: TerminalError, attempts: Vec<Attempt>) -> Self {
        Self { error, attempts }
    }
}
