//! Shared utilities for integration testing: scripted in-process provider
//! adapters and config builders.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use llm_gateway::error::{FaultKind, ProviderFault};
use llm_gateway::observability::NullSink;
use llm_gateway::provider::{ChunkSource, ProviderAdapter, ProviderSuccess, StreamItem};
use llm_gateway::types::Message;
use llm_gateway::{ChatRequest, GatewayConfig, Orchestrator, ProviderDescriptor};

/// One scripted response for a buffered completion call.
pub enum CompleteScript {
    Ok(&'static str),
    Fault(FaultKind, &'static str),
    /// Never resolves; for cancellation tests.
    Hang,
}

/// One scripted step of a chunk stream.
pub enum StreamStep {
    /// A well-formed delta frame.
    Delta(&'static str),
    /// A raw chunk payload, exactly as given (for malformed-data tests).
    Raw(&'static str),
    /// Go quiet for this long before producing the next step.
    Silence(Duration),
    Done,
    Fault(FaultKind, &'static str),
}

/// One scripted response for an open_stream call.
pub enum StreamScript {
    ConnectFault(FaultKind, &'static str),
    Steps(Vec<StreamStep>),
}

/// Scripted provider adapter. Each call pops the next script entry;
/// an exhausted script succeeds with a fixed payload.
pub struct MockAdapter {
    completes: Mutex<VecDeque<CompleteScript>>,
    streams: Mutex<VecDeque<StreamScript>>,
    pub complete_calls: AtomicU32,
    pub stream_calls: AtomicU32,
}

impl MockAdapter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            completes: Mutex::new(VecDeque::new()),
            streams: Mutex::new(VecDeque::new()),
            complete_calls: AtomicU32::new(0),
            stream_calls: AtomicU32::new(0),
        })
    }

    pub fn script_complete(self: &Arc<Self>, script: impl IntoIterator<Item = CompleteScript>) {
        self.completes.lock().unwrap().extend(script);
    }

    pub fn script_stream(self: &Arc<Self>, script: impl IntoIterator<Item = StreamScript>) {
        self.streams.lock().unwrap().extend(script);
    }

    pub fn calls(&self) -> u32 {
        self.complete_calls.load(Ordering::SeqCst) + self.stream_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderAdapter for MockAdapter {
    async fn complete(
        &self,
        _descriptor: &ProviderDescriptor,
        _request: &ChatRequest,
    ) -> Result<ProviderSuccess, ProviderFault> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.completes.lock().unwrap().pop_front();
        match next {
            Some(CompleteScript::Ok(content)) => Ok(ProviderSuccess {
                content: content.to_string(),
                tokens_used: Some(42),
            }),
            Some(CompleteScript::Fault(kind, message)) => {
                Err(ProviderFault::new(kind, message))
            }
            Some(CompleteScript::Hang) => std::future::pending().await,
            None => Ok(ProviderSuccess {
                content: "ok".to_string(),
                tokens_used: None,
            }),
        }
    }

    async fn open_stream(
        &self,
        _descriptor: &ProviderDescriptor,
        _request: &ChatRequest,
    ) -> Result<Box<dyn ChunkSource>, ProviderFault> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.streams.lock().unwrap().pop_front();
        match next {
            Some(StreamScript::ConnectFault(kind, message)) => {
                Err(ProviderFault::new(kind, message))
            }
            Some(StreamScript::Steps(steps)) => Ok(Box::new(MockChunkSource {
                steps: steps.into(),
            })),
            None => Ok(Box::new(MockChunkSource {
                steps: vec![StreamStep::Delta("ok"), StreamStep::Done].into(),
            })),
        }
    }
}

struct MockChunkSource {
    steps: VecDeque<StreamStep>,
}

#[async_trait]
impl ChunkSource for MockChunkSource {
    async fn next(&mut self) -> StreamItem {
        loop {
            match self.steps.pop_front() {
                Some(StreamStep::Delta(text)) => {
                    return StreamItem::Chunk(
                        serde_json::json!({ "delta": text }).to_string(),
                    );
                }
                Some(StreamStep::Raw(raw)) => return StreamItem::Chunk(raw.to_string()),
                Some(StreamStep::Silence(duration)) => {
                    tokio::time::sleep(duration).await;
                }
                Some(StreamStep::Done) => return StreamItem::Done,
                Some(StreamStep::Fault(kind, message)) => {
                    return StreamItem::Fault(ProviderFault::new(kind, message));
                }
                // Exhausted script: go silent until the relay times out.
                None => std::future::pending().await,
            }
        }
    }
}

pub fn provider(name: &str, priority: u32, models: &[&str]) -> ProviderDescriptor {
    ProviderDescriptor {
        name: name.to_string(),
        endpoint: format!("https://{name}.example.com/v1"),
        models: models.iter().map(|m| m.to_string()).collect(),
        priority,
    }
}

pub fn request(model: &str) -> ChatRequest {
    ChatRequest {
        model: model.to_string(),
        messages: vec![Message::new("user", "hello")],
        temperature: None,
        max_tokens: None,
        stream: false,
        preferred_provider: None,
    }
}

/// Config tuned for fast tests: short backoff, short circuit reset, short
/// chunk timeout.
pub fn fast_config(providers: Vec<ProviderDescriptor>) -> GatewayConfig {
    let mut config = GatewayConfig {
        providers,
        ..Default::default()
    };
    config.retries.max_attempts_per_provider = 3;
    config.retries.base_delay_ms = 10;
    config.retries.max_delay_ms = 40;
    config.retries.max_total_attempts = 8;
    config.circuit_breaker.failure_threshold = 3;
    config.circuit_breaker.reset_timeout_ms = 100;
    config.stream.chunk_timeout_ms = 100;
    config
}

pub fn orchestrator(
    config: &GatewayConfig,
    adapters: Vec<(&str, Arc<MockAdapter>)>,
) -> Orchestrator {
    // Visible with RUST_LOG set; silent otherwise. Safe to call repeatedly.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let adapters: HashMap<String, Arc<dyn ProviderAdapter>> = adapters
        .into_iter()
        .map(|(name, adapter)| (name.to_string(), adapter as Arc<dyn ProviderAdapter>))
        .collect();
    Orchestrator::new(config, adapters, Arc::new(NullSink)).expect("valid test setup")
}
