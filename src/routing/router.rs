//! Provider selection.

use std::collections::HashSet;

use crate::provider::ProviderDescriptor;
use crate::resilience::CircuitBreakerRegistry;

/// Maps a requested model to the next eligible provider.
///
/// Immutable after construction; shared by all concurrent requests.
#[derive(Debug)]
pub struct ProviderRouter {
    /// Sorted by priority at construction; the sort is stable so equal
    /// priorities keep configuration order.
    providers: Vec<ProviderDescriptor>,
}

impl ProviderRouter {
    pub fn from_config(mut providers: Vec<ProviderDescriptor>) -> Self {
        providers.sort_by_key(|p| p.priority);
        Self { providers }
    }

    /// Select the next eligible provider for `model`.
    ///
    /// A provider is eligible when it supports the model, is not in
    /// `excluded`, and its circuit admits an attempt. `preferred` is the
    /// caller's hint, honored only when that provider is itself eligible;
    /// the orchestrator passes it on the first selection of a request only.
    ///
    /// Circuit eligibility is checked candidate-by-candidate in priority
    /// order, so a HalfOpen probe admission is consumed only by the
    /// provider actually returned.
    pub fn select(
        &self,
        model: &str,
        excluded: &HashSet<String>,
        preferred: Option<&str>,
        circuits: &CircuitBreakerRegistry,
    ) -> Option<&ProviderDescriptor> {
        let eligible = |p: &ProviderDescriptor| {
            p.supports(model) && !excluded.contains(&p.name) && circuits.can_execute(&p.name)
        };

        if let Some(name) = preferred {
            if let Some(hinted) = self.providers.iter().find(|p| p.name == name) {
                if eligible(hinted) {
                    return Some(hinted);
                }
                tracing::debug!(
                    provider = %name,
                    model = %model,
                    "Preferred provider not eligible, falling back to priority order"
                );
            }
        }

        self.providers.iter().find(|p| eligible(p))
    }

    pub fn providers(&self) -> &[ProviderDescriptor] {
        &self.providers
    }
}
