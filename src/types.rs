//! Wire-facing data model.
//!
//! Field names mirror the JSON the inbound transport speaks; the transport
//! itself (framing, validation) lives outside this crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::FaultKind;

/// A single chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// "user", "assistant", or "system".
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// An already-validated chat completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Target model, e.g. "gpt-4".
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub stream: bool,
    /// Caller hint honored on the first provider selection only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_provider: Option<String>,
}

/// One in-flight request as the orchestrator sees it.
///
/// Immutable once constructed; owned by exactly one orchestrator execution.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub id: Uuid,
    pub request: ChatRequest,
    pub created_at: DateTime<Utc>,
}

impl RequestContext {
    pub fn new(request: ChatRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            request,
            created_at: Utc::now(),
        }
    }
}

/// Outcome of a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Success,
    Failed,
}

/// Record of one attempt against one provider. Append-only.
#[derive(Debug, Clone, Serialize)]
pub struct Attempt {
    pub request_id: Uuid,
    /// 1-based, restarts at 1 whenever the orchestrator switches providers.
    pub attempt_number: u32,
    pub provider: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub status: AttemptStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<FaultKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Token usage reported by the provider, successful attempts only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u32>,
    pub latency_ms: u64,
}

/// Final successful response to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct Completion {
    pub request_id: Uuid,
    pub content: String,
    pub model: String,
    /// The provider that actually served the request.
    pub provider: String,
    /// Total attempts summed across all providers tried.
    pub attempts: u32,
    pub total_latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u32>,
    pub created_at: DateTime<Utc>,
}
