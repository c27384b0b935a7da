//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check provider list integrity (unique names, non-empty model lists)
//! - Validate value ranges (delays > 0, thresholds >= 1)
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use crate::config::schema::GatewayConfig;

/// A single semantic configuration error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("no providers configured")]
    NoProviders,

    #[error("duplicate provider name '{0}'")]
    DuplicateProvider(String),

    #[error("provider '{0}' has an empty name")]
    EmptyProviderName(String),

    #[error("provider '{0}' supports no models")]
    NoModels(String),

    #[error("retries.max_attempts_per_provider must be >= 1")]
    ZeroAttemptsPerProvider,

    #[error("retries.max_total_attempts must be >= 1")]
    ZeroTotalAttempts,

    #[error("retries.base_delay_ms must be > 0")]
    ZeroBaseDelay,

    #[error("retries.base_delay_ms ({base}) exceeds retries.max_delay_ms ({max})")]
    BaseDelayAboveMax { base: u64, max: u64 },

    #[error("circuit_breaker.failure_threshold must be >= 1")]
    ZeroFailureThreshold,

    #[error("circuit_breaker.reset_timeout_ms must be > 0")]
    ZeroResetTimeout,

    #[error("stream.chunk_timeout_ms must be > 0")]
    ZeroChunkTimeout,
}

/// Validate a configuration, collecting every error found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.providers.is_empty() {
        errors.push(ValidationError::NoProviders);
    }

    let mut seen = HashSet::new();
    for provider in &config.providers {
        if provider.name.is_empty() {
            errors.push(ValidationError::EmptyProviderName(provider.endpoint.clone()));
        } else if !seen.insert(provider.name.clone()) {
            errors.push(ValidationError::DuplicateProvider(provider.name.clone()));
        }
        if provider.models.is_empty() {
            errors.push(ValidationError::NoModels(provider.name.clone()));
        }
    }

    if config.retries.max_attempts_per_provider == 0 {
        errors.push(ValidationError::ZeroAttemptsPerProvider);
    }
    if config.retries.max_total_attempts == 0 {
        errors.push(ValidationError::ZeroTotalAttempts);
    }
    if config.retries.base_delay_ms == 0 {
        errors.push(ValidationError::ZeroBaseDelay);
    }
    if config.retries.base_delay_ms > config.retries.max_delay_ms {
        errors.push(ValidationError::BaseDelayAboveMax {
            base: config.retries.base_delay_ms,
            max: config.retries.max_delay_ms,
        });
    }
    if config.circuit_breaker.failure_threshold == 0 {
        errors.push(ValidationError::ZeroFailureThreshold);
    }
    if config.circuit_breaker.reset_timeout_ms == 0 {
        errors.push(ValidationError::ZeroResetTimeout);
    }
    if config.stream.chunk_timeout_ms == 0 {
        errors.push(ValidationError::ZeroChunkTimeout);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
