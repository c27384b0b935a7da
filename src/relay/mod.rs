//! Streaming response relay.
//!
//! # Data Flow
//! ```text
//! ChunkSource (provider adapter)
//!     → pull next item, racing chunk_timeout and cancellation
//!     → parse chunk frame ({"delta": "..."}) → forward delta to caller
//!     → accumulate partial-content buffer for failure reporting
//!     → Done sentinel → Completed
//! ```
//!
//! # Design Decisions
//! - Liveness: a fresh chunk_timeout races every pull, so the timeout
//!   measures silence since the last chunk (or since stream start)
//! - A chunk that fails to parse aborts immediately; no repair attempts
//! - Outbound send failure means the caller went away; that outcome is
//!   never attributed to the provider
//! - The relay reports how many chunks were forwarded; whether a failure
//!   is terminal for the request is the orchestrator's call

use std::time::Duration;

use serde::Deserialize;
use tokio::sync::mpsc;

use crate::config::StreamConfig;
use crate::error::ProviderFault;
use crate::lifecycle::Cancellation;
use crate::provider::{ChunkSource, StreamItem};

/// Why a relayed stream failed.
#[derive(Debug, Clone)]
pub enum RelayError {
    /// No chunk observed within the chunk timeout.
    Stalled { idle: Duration },
    /// A chunk failed to parse as a delta frame.
    Malformed { detail: String },
    /// The upstream reported a fault mid-stream.
    Upstream(ProviderFault),
}

/// Terminal outcome of one relayed stream.
#[derive(Debug)]
pub enum RelayOutcome {
    /// Completion sentinel received; `content` is every delivered delta.
    Completed { content: String, chunks_forwarded: u64 },
    /// The stream failed. `partial` holds exactly the forwarded deltas.
    Failed {
        error: RelayError,
        partial: String,
        chunks_forwarded: u64,
    },
    /// The caller disconnected or cancelled. Not a provider failure.
    ClientAborted {
        partial: String,
        chunks_forwarded: u64,
    },
}

/// Structured chunk frame. Adapters normalize provider wire formats into
/// this before handing chunks to the relay.
#[derive(Debug, Deserialize)]
struct ChunkFrame {
    delta: String,
}

/// Forwards a provider's chunked output to the caller with stall and
/// malformed-data detection.
#[derive(Debug, Clone)]
pub struct StreamRelay {
    chunk_timeout: Duration,
}

impl StreamRelay {
    pub fn new(config: &StreamConfig) -> Self {
        Self {
            chunk_timeout: Duration::from_millis(config.chunk_timeout_ms),
        }
    }

    /// Drive `source` to a terminal outcome, forwarding each delta to
    /// `outbound`.
    ///
    /// Returning drops `source`, which cancels the upstream read.
    pub async fn run(
        &self,
        mut source: Box<dyn ChunkSource>,
        outbound: &mpsc::Sender<String>,
        cancel: &Cancellation,
    ) -> RelayOutcome {
        let mut partial = String::new();
        let mut forwarded: u64 = 0;

        loop {
            let item = tokio::select! {
                item = source.next() => item,
                _ = tokio::time::sleep(self.chunk_timeout) => {
                    tracing::warn!(
                        idle_ms = self.chunk_timeout.as_millis() as u64,
                        chunks_forwarded = forwarded,
                        "Stream stalled"
                    );
                    return RelayOutcome::Failed {
                        error: RelayError::Stalled { idle: self.chunk_timeout },
                        partial,
                        chunks_forwarded: forwarded,
                    };
                }
                _ = cancel.cancelled() => {
                    return RelayOutcome::ClientAborted {
                        partial,
                        chunks_forwarded: forwarded,
                    };
                }
            };

            match item {
                StreamItem::Chunk(raw) => {
                    let frame: ChunkFrame = match serde_json::from_str(&raw) {
                        Ok(frame) => frame,
                        Err(e) => {
                            tracing::warn!(
                                error = %e,
                                chunks_forwarded = forwarded,
                                "Malformed stream chunk"
                            );
                            return RelayOutcome::Failed {
                                error: RelayError::Malformed {
                                    detail: e.to_string(),
                                },
                                partial,
                                chunks_forwarded: forwarded,
                            };
                        }
                    };

                    let delivered = tokio::select! {
                        sent = outbound.send(frame.delta.clone()) => sent.is_ok(),
                        _ = cancel.cancelled() => false,
                    };
                    if !delivered {
                        return RelayOutcome::ClientAborted {
                            partial,
                            chunks_forwarded: forwarded,
                        };
                    }
                    partial.push_str(&frame.delta);
                    forwarded += 1;
                }
                StreamItem::Done => {
                    tracing::debug!(chunks_forwarded = forwarded, "Stream completed");
                    return RelayOutcome::Completed {
                        content: partial,
                        chunks_forwarded: forwarded,
                    };
                }
                StreamItem::Fault(fault) => {
                    tracing::warn!(
                        kind = fault.kind.as_str(),
                        error = %fault.message,
                        chunks_forwarded = forwarded,
                        "Upstream fault mid-stream"
                    );
                    return RelayOutcome::Failed {
                        error: RelayError::Upstream(fault),
                        partial,
                        chunks_forwarded: forwarded,
                    };
                }
            }
        }
    }
}
