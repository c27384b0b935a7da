//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

/// Pre-jitter delay for the k-th retry (k >= 1) on one provider:
/// `min(base * 2^(k-1), max)`.
pub fn backoff_delay(retry: u32, base_ms: u64, max_ms: u64) -> Duration {
    if retry == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(retry - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    Duration::from_millis(delay_ms.min(max_ms))
}

/// Apply a uniformly sampled jitter factor in [0.8, 1.2].
///
/// Jitter desynchronizes many concurrent clients retrying the same
/// provider at once.
pub fn jittered(delay: Duration) -> Duration {
    let factor: f64 = rand::thread_rng().gen_range(0.8..=1.2);
    delay.mul_f64(factor)
}
