//! Retry policy for provider calls: classify, gate through the circuit
//! breaker, and back off with jitter on transient failure.

use std::time::Duration;

use rand::Rng;

use crate::circuit_breaker::ProviderCircuitBreaker;
use crate::classify::{classify, ErrorClass};

const BASE_DELAY: Duration = Duration::from_secs(1);
const MAX_DELAY: Duration = Duration::from_secs(60);

/// What the caller should do after a failed provider call.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
    /// Transient and the breaker still allows it: wait `delay` then retry.
    Retry { delay: Duration },
    /// Permanent, unknown, or the breaker has tripped: give up.
    GiveUp { reason: String },
}

/// Full jitter exponential backoff: `random(0, min(cap, base * 2^attempt))`.
pub fn backoff_delay(attempt: u32) -> Duration {
    let exp = BASE_DELAY.as_millis().saturating_mul(1u128 << attempt.min(6));
    let capped = exp.min(MAX_DELAY.as_millis());
    let jittered = rand::thread_rng().gen_range(0..=capped.max(1));
    Duration::from_millis(jittered as u64)
}

/// Classify `error_message`, record it against the provider's circuit,
/// and decide whether the caller should retry.
pub fn decide(
    breaker: &ProviderCircuitBreaker,
    provider: &str,
    error_message: &str,
    attempt: u32,
) -> RetryDecision {
    let class = classify(error_message);
    breaker.record_failure(provider);

    match class {
        ErrorClass::Transient if breaker.can_retry(provider) => RetryDecision::Retry {
            delay: backoff_delay(attempt),
        },
        ErrorClass::Transient => RetryDecision::GiveUp {
            reason: format!("provider '{provider}' circuit open after transient failure"),
        },
        ErrorClass::Permanent | ErrorClass::Unknown => RetryDecision::GiveUp {
            reason: format!("non-retryable failure: {error_message}"),
        },
    }
}
