//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway
//! core. All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::provider::ProviderDescriptor;

/// Root configuration for the gateway core.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Provider definitions, in priority-tie-break order.
    pub providers: Vec<ProviderDescriptor>,

    /// Retry and attempt-budget configuration.
    pub retries: RetryConfig,

    /// Per-provider circuit breaker configuration.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Streaming relay configuration.
    pub stream: StreamConfig,
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum attempts against a single provider before failing over.
    pub max_attempts_per_provider: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Cap on total attempts across all providers for one request.
    /// Bounds worst-case latency regardless of provider count.
    pub max_total_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts_per_provider: 3,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
            max_total_attempts: 8,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before a provider's circuit opens.
    pub failure_threshold: u32,

    /// Time an open circuit waits before admitting a single probe, in
    /// milliseconds.
    pub reset_timeout_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout_ms: 30_000,
        }
    }
}

/// Streaming relay configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Maximum silence between chunks (and before the first chunk) before
    /// the stream is declared stalled, in milliseconds.
    pub chunk_timeout_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            chunk_timeout_ms: 15_000,
        }
    }
}
