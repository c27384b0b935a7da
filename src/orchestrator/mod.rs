//! Request orchestration.
//!
//! # Data Flow
//! ```text
//! Validated ChatRequest + Cancellation token
//!     → assign request ID, empty attempt history, attempt budget
//!     → loop: router selects an eligible provider (circuit consulted)
//!         → up to max_attempts_per_provider attempts with backoff
//!         → every outcome recorded into the circuit registry BEFORE
//!           the retry decision
//!         → retry same provider / fail over / abort per classification
//!     → Completion, or a terminal failure carrying the attempt history
//! ```
//!
//! # Design Decisions
//! - Attempts within one request are strictly sequential
//! - Rate limits fail over with no local wait
//! - Streaming delegates to the relay after the first successful connect;
//!   once a chunk has been forwarded, any failure is terminal for the
//!   request (delivered content cannot be un-sent)
//! - Caller cancellation never records a provider failure; a half-open
//!   probe held by a cancelled attempt is handed back to the registry

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::config::validation::{validate_config, ValidationError};
use crate::config::GatewayConfig;
use crate::error::{FaultKind, GatewayFailure, ProviderFault, TerminalError};
use crate::lifecycle::Cancellation;
use crate::observability::EventSink;
use crate::provider::{ProviderAdapter, ProviderDescriptor, ProviderSuccess};
use crate::relay::{RelayError, RelayOutcome, StreamRelay};
use crate::resilience::{CircuitBreakerRegistry, CircuitState, RetryDecision, RetryPolicy};
use crate::routing::ProviderRouter;
use crate::types::{Attempt, AttemptStatus, ChatRequest, Completion, RequestContext};

/// Error constructing an [`Orchestrator`].
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("invalid configuration: {0:?}")]
    InvalidConfig(Vec<ValidationError>),

    #[error("no adapter registered for provider '{0}'")]
    MissingAdapter(String),
}

/// Top-level coordinator: drives the attempt loop for one request at a
/// time per call; safe to share across concurrent requests.
pub struct Orchestrator {
    router: ProviderRouter,
    circuits: Arc<CircuitBreakerRegistry>,
    adapters: HashMap<String, Arc<dyn ProviderAdapter>>,
    policy: RetryPolicy,
    relay: StreamRelay,
    sink: Arc<dyn EventSink>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator").finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Build an orchestrator from validated config and one adapter per
    /// configured provider.
    pub fn new(
        config: &GatewayConfig,
        adapters: HashMap<String, Arc<dyn ProviderAdapter>>,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self, BuildError> {
        validate_config(config).map_err(BuildError::InvalidConfig)?;
        for provider in &config.providers {
            if !adapters.contains_key(&provider.name) {
                return Err(BuildError::MissingAdapter(provider.name.clone()));
            }
        }

        let circuits = Arc::new(CircuitBreakerRegistry::new(
            config.providers.iter().map(|p| p.name.clone()),
            &config.circuit_breaker,
            sink.clone(),
        ));

        Ok(Self {
            router: ProviderRouter::from_config(config.providers.clone()),
            circuits,
            adapters,
            policy: RetryPolicy::new(config.retries.clone()),
            relay: StreamRelay::new(&config.stream),
            sink,
        })
    }

    /// Circuit registry shared with this orchestrator, for diagnostics.
    pub fn circuits(&self) -> &CircuitBreakerRegistry {
        &self.circuits
    }

    /// Execute a buffered (non-streaming) request.
    pub async fn execute(
        &self,
        request: ChatRequest,
        cancel: Cancellation,
    ) -> Result<Completion, GatewayFailure> {
        self.drive(RequestContext::new(request), None, cancel).await
    }

    /// Execute a streaming request, forwarding deltas to `outbound` as
    /// they arrive. The returned completion carries the concatenated
    /// content for accounting.
    pub async fn execute_streaming(
        &self,
        request: ChatRequest,
        outbound: mpsc::Sender<String>,
        cancel: Cancellation,
    ) -> Result<Completion, GatewayFailure> {
        self.drive(RequestContext::new(request), Some(outbound), cancel)
            .await
    }

    async fn drive(
        &self,
        ctx: RequestContext,
        outbound: Option<mpsc::Sender<String>>,
        cancel: Cancellation,
    ) -> Result<Completion, GatewayFailure> {
        let started = Instant::now();
        let mut history: Vec<Attempt> = Vec::new();
        let mut excluded: HashSet<String> = HashSet::new();
        let mut total_attempts: u32 = 0;

        tracing::debug!(
            request_id = %ctx.id,
            model = %ctx.request.model,
            streaming = outbound.is_some(),
            "Executing request"
        );

        'providers: loop {
            // Checked before selection: asking the router for a provider can
            // consume a half-open probe admission, which must not happen for
            // a request with no budget left to actually attempt it.
            if total_attempts >= self.policy.max_total_attempts() {
                tracing::warn!(
                    request_id = %ctx.id,
                    attempts = total_attempts,
                    "Attempt budget exhausted"
                );
                return Err(GatewayFailure::new(
                    TerminalError::ExhaustedRetries {
                        attempts: total_attempts,
                    },
                    history,
                ));
            }

            // The caller hint applies to the first selection only.
            let preferred = if total_attempts == 0 {
                ctx.request.preferred_provider.as_deref()
            } else {
                None
            };

            let descriptor = match self
                .router
                .select(&ctx.request.model, &excluded, preferred, &self.circuits)
            {
                Some(d) => d.clone(),
                None => {
                    tracing::warn!(
                        request_id = %ctx.id,
                        model = %ctx.request.model,
                        tried = excluded.len(),
                        "No provider available"
                    );
                    return Err(GatewayFailure::new(
                        TerminalError::NoProviderAvailable {
                            model: ctx.request.model.clone(),
                        },
                        history,
                    ));
                }
            };

            let adapter = match self.adapters.get(&descriptor.name) {
                Some(a) => a.clone(),
                None => {
                    // Construction checks this; an absent adapter means the
                    // provider set and adapter set diverged at runtime.
                    tracing::error!(provider = %descriptor.name, "No adapter for selected provider");
                    excluded.insert(descriptor.name.clone());
                    continue 'providers;
                }
            };

            for attempt_number in 1..=self.policy.max_attempts_per_provider() {
                total_attempts += 1;

                // Whether this attempt holds its circuit's single half-open
                // probe; an unresolved probe must be handed back.
                let probing = self
                    .circuits
                    .snapshot(&descriptor.name)
                    .map_or(false, |s| s.state == CircuitState::HalfOpen);

                let started_at = Utc::now();
                let t0 = Instant::now();
                let outcome = self
                    .attempt(&ctx, &descriptor, adapter.as_ref(), outbound.as_ref(), &cancel)
                    .await;

                match outcome {
                    AttemptOutcome::Success(success) => {
                        self.push_attempt(
                            &mut history,
                            &ctx,
                            &descriptor.name,
                            attempt_number,
                            started_at,
                            t0.elapsed(),
                            AttemptStatus::Success,
                            None,
                            None,
                            success.tokens_used,
                        );
                        self.circuits.record_success(&descriptor.name);
                        return Ok(Completion {
                            request_id: ctx.id,
                            content: success.content,
                            model: ctx.request.model.clone(),
                            provider: descriptor.name.clone(),
                            attempts: total_attempts,
                            total_latency_ms: started.elapsed().as_millis() as u64,
                            tokens_used: success.tokens_used,
                            created_at: Utc::now(),
                        });
                    }

                    AttemptOutcome::Fault(fault) => {
                        self.push_attempt(
                            &mut history,
                            &ctx,
                            &descriptor.name,
                            attempt_number,
                            started_at,
                            t0.elapsed(),
                            AttemptStatus::Failed,
                            Some(fault.kind),
                            Some(fault.message.clone()),
                            None,
                        );
                        // Recorded before any retry decision is taken.
                        self.circuits.record_failure(&descriptor.name);

                        match self.policy.decide(fault.kind) {
                            RetryDecision::Abort => {
                                return Err(GatewayFailure::new(
                                    TerminalError::NonRetryable {
                                        provider: descriptor.name.clone(),
                                        kind: fault.kind,
                                        message: fault.message,
                                    },
                                    history,
                                ));
                            }
                            RetryDecision::Failover => {
                                tracing::info!(
                                    request_id = %ctx.id,
                                    provider = %descriptor.name,
                                    kind = fault.kind.as_str(),
                                    "Failing over"
                                );
                                break;
                            }
                            RetryDecision::RetrySameProvider => {
                                // Out of attempts here, or out of budget:
                                // don't wait out a backoff first.
                                if attempt_number >= self.policy.max_attempts_per_provider()
                                    || total_attempts >= self.policy.max_total_attempts()
                                {
                                    break;
                                }
                                let delay = self.policy.backoff(attempt_number);
                                tracing::info!(
                                    request_id = %ctx.id,
                                    provider = %descriptor.name,
                                    attempt = attempt_number,
                                    delay_ms = delay.as_millis() as u64,
                                    "Retrying after backoff"
                                );
                                tokio::select! {
                                    _ = tokio::time::sleep(delay) => {}
                                    _ = cancel.cancelled() => {
                                        return Err(GatewayFailure::new(
                                            TerminalError::Cancelled,
                                            history,
                                        ));
                                    }
                                }
                                // Another request may have opened this
                                // circuit during the wait.
                                if !self.circuits.can_execute(&descriptor.name) {
                                    break;
                                }
                            }
                        }
                    }

                    AttemptOutcome::Cancelled => {
                        self.push_attempt(
                            &mut history,
                            &ctx,
                            &descriptor.name,
                            attempt_number,
                            started_at,
                            t0.elapsed(),
                            AttemptStatus::Failed,
                            Some(FaultKind::Cancelled),
                            Some("cancelled by caller".to_string()),
                            None,
                        );
                        // No failure recorded: the provider did nothing
                        // wrong. A held probe still goes back, or the
                        // circuit stays half-open forever.
                        if probing {
                            self.circuits.release_probe(&descriptor.name);
                        }
                        return Err(GatewayFailure::new(TerminalError::Cancelled, history));
                    }

                    AttemptOutcome::ClientAborted { partial } => {
                        self.push_attempt(
                            &mut history,
                            &ctx,
                            &descriptor.name,
                            attempt_number,
                            started_at,
                            t0.elapsed(),
                            AttemptStatus::Failed,
                            Some(FaultKind::Cancelled),
                            Some("client aborted while streaming".to_string()),
                            None,
                        );
                        if probing {
                            self.circuits.release_probe(&descriptor.name);
                        }
                        return Err(GatewayFailure::new(
                            TerminalError::ClientAborted {
                                partial_content: partial,
                            },
                            history,
                        ));
                    }

                    AttemptOutcome::StreamTerminal {
                        error,
                        kind,
                        message,
                    } => {
                        self.push_attempt(
                            &mut history,
                            &ctx,
                            &descriptor.name,
                            attempt_number,
                            started_at,
                            t0.elapsed(),
                            AttemptStatus::Failed,
                            Some(kind),
                            Some(message),
                            None,
                        );
                        self.circuits.record_failure(&descriptor.name);
                        return Err(GatewayFailure::new(error, history));
                    }
                }
            }

            // Single exit for a provider that is exhausted, failed over, or
            // lost its circuit during a backoff wait.
            excluded.insert(descriptor.name.clone());
        }
    }

    /// Run one attempt to a typed outcome. Streaming requests hand off to
    /// the relay after a successful connect.
    async fn attempt(
        &self,
        ctx: &RequestContext,
        descriptor: &ProviderDescriptor,
        adapter: &dyn ProviderAdapter,
        outbound: Option<&mpsc::Sender<String>>,
        cancel: &Cancellation,
    ) -> AttemptOutcome {
        let Some(outbound) = outbound else {
            return tokio::select! {
                result = adapter.complete(descriptor, &ctx.request) => match result {
                    Ok(success) => AttemptOutcome::Success(success),
                    Err(fault) => AttemptOutcome::Fault(fault),
                },
                _ = cancel.cancelled() => AttemptOutcome::Cancelled,
            };
        };

        let connect = tokio::select! {
            result = adapter.open_stream(descriptor, &ctx.request) => result,
            _ = cancel.cancelled() => return AttemptOutcome::Cancelled,
        };
        let source = match connect {
            Ok(source) => source,
            Err(fault) => return AttemptOutcome::Fault(fault),
        };

        match self.relay.run(source, outbound, cancel).await {
            RelayOutcome::Completed { content, .. } => AttemptOutcome::Success(ProviderSuccess {
                content,
                tokens_used: None,
            }),
            RelayOutcome::ClientAborted { partial, .. } => {
                AttemptOutcome::ClientAborted { partial }
            }
            RelayOutcome::Failed {
                error,
                partial,
                chunks_forwarded,
            } => {
                if chunks_forwarded == 0 {
                    // Nothing delivered yet: fold back into the normal
                    // retry/failover path as an ordinary attempt failure.
                    AttemptOutcome::Fault(match error {
                        RelayError::Stalled { idle } => ProviderFault::new(
                            FaultKind::Timeout,
                            format!("stream stalled before first chunk ({}ms)", idle.as_millis()),
                        ),
                        RelayError::Malformed { detail } => {
                            ProviderFault::new(FaultKind::Malformed, detail)
                        }
                        RelayError::Upstream(fault) => fault,
                    })
                } else {
                    // Content already delivered cannot be un-sent.
                    let (error, kind, message) = match error {
                        RelayError::Stalled { idle } => (
                            TerminalError::StreamStalled {
                                provider: descriptor.name.clone(),
                                idle_ms: idle.as_millis() as u64,
                                partial_content: partial,
                            },
                            FaultKind::Timeout,
                            format!("stream stalled after {}ms of silence", idle.as_millis()),
                        ),
                        RelayError::Malformed { detail } => (
                            TerminalError::StreamMalformed {
                                provider: descriptor.name.clone(),
                                detail: detail.clone(),
                                partial_content: partial,
                            },
                            FaultKind::Malformed,
                            detail,
                        ),
                        RelayError::Upstream(fault) => (
                            TerminalError::StreamInterrupted {
                                provider: descriptor.name.clone(),
                                kind: fault.kind,
                                message: fault.message.clone(),
                                partial_content: partial,
                            },
                            fault.kind,
                            fault.message,
                        ),
                    };
                    AttemptOutcome::StreamTerminal {
                        error,
                        kind,
                        message,
                    }
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn push_attempt(
        &self,
        history: &mut Vec<Attempt>,
        ctx: &RequestContext,
        provider: &str,
        attempt_number: u32,
        started_at: DateTime<Utc>,
        elapsed: Duration,
        status: AttemptStatus,
        error_kind: Option<FaultKind>,
        error_message: Option<String>,
        tokens_used: Option<u32>,
    ) {
        let attempt = Attempt {
            request_id: ctx.id,
            attempt_number,
            provider: provider.to_string(),
            started_at,
            ended_at: Utc::now(),
            status,
            error_kind,
            error_message,
            tokens_used,
            latency_ms: elapsed.as_millis() as u64,
        };
        self.sink.attempt(&attempt);
        history.push(attempt);
    }
}

/// Typed outcome of one attempt, before the retry decision.
enum AttemptOutcome {
    Success(ProviderSuccess),
    Fault(ProviderFault),
    Cancelled,
    ClientAborted { partial: String },
    StreamTerminal {
        error: TerminalError,
        kind: FaultKind,
        message: String,
    },
}
