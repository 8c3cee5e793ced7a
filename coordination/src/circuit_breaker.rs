//! Provider Circuit Breaker — per-provider state machine gating retries
//! across shared model endpoints.
//!
//! Generalized from a fixed-enum model registry to an arbitrary lowercased
//! provider name, since the core treats providers as opaque collaborators
//! (see `crate::classify` and the Agent Runtime contract). Thread-safe:
//! every provider's counters live behind a single mutex-guarded map, which
//! is cheap enough at the cardinality of "distinct provider names."

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;

/// Circuit breaker state for a single provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Healthy — requests allowed.
    Closed,
    /// Tripped — requests blocked until `open_duration` elapses.
    Open,
    /// Cooldown elapsed — one probe request allowed.
    HalfOpen,
}

#[derive(Debug, Clone, Default)]
struct BreakerEntry {
    consecutive_failures: u32,
    state: InternalState,
    opened_at: Option<Instant>,
    last_failure_at: Option<Instant>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum InternalState {
    #[default]
    Closed,
    Open,
    HalfOpen,
}

/// Tunable thresholds for a [`ProviderCircuitBreaker`].
#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,
    /// How long the circuit stays Open before allowing a HalfOpen probe.
    pub open_duration: Duration,
    /// Time since the last failure, while Closed, after which the failure
    /// counter resets to zero (a Closed circuit "forgets" old failures).
    pub reset_after_success: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            open_duration: Duration::from_secs(10 * 60),
            reset_after_success: Duration::from_secs(5 * 60),
        }
    }
}

/// Per-provider circuit breaker. All operations are thread-safe.
///
/// Empty provider names are treated as a no-op passthrough: `can_retry`
/// always returns `true` and the record methods do nothing. This lets
/// callers skip a "do I have a provider name yet" branch at call sites
/// where the provider may not be resolved.
pub struct ProviderCircuitBreaker {
    config: BreakerConfig,
    entries: Mutex<HashMap<String, BreakerEntry>>,
}

impl ProviderCircuitBreaker {
    /// Create a breaker with the given thresholds.
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn key(provider: &str) -> String {
        provider.to_lowercase()
    }

    /// Record a failed call against `provider`.
    ///
    /// Closed + threshold reached -> Open. HalfOpen -> Open (reopen with a
    /// refreshed `opened_at`, i.e. the probe failed).
    pub fn record_failure(&self, provider: &str) {
        if provider.is_empty() {
            return;
        }
        let key = Self::key(provider);
        let mut entries = self.entries.lock().expect("circuit breaker mutex poisoned");
        let entry = entries.entry(key.clone()).or_default();
        entry.consecutive_failures += 1;
        entry.last_failure_at = Some(Instant::now());

        match entry.state {
            InternalState::Closed => {
                if entry.consecutive_failures >= self.config.failure_threshold {
                    entry.state = InternalState::Open;
                    entry.opened_at = Some(Instant::now());
                    debug!(provider = %key, failures = entry.consecutive_failures, "circuit opened");
                }
            }
            InternalState::HalfOpen => {
                entry.state = InternalState::Open;
                entry.opened_at = Some(Instant::now());
                debug!(provider = %key, "circuit reopened from half-open probe failure");
            }
            InternalState::Open => {}
        }
    }

    /// Record a successful call against `provider`. Resets to Closed with
    /// zeroed failure count.
    pub fn record_success(&self, provider: &str) {
        if provider.is_empty() {
            return;
        }
        let key = Self::key(provider);
        let mut entries = self.entries.lock().expect("circuit breaker mutex poisoned");
        let entry = entries.entry(key.clone()).or_default();
        if entry.state != InternalState::Closed {
            debug!(provider = %key, "circuit closed after success");
        }
        entry.consecutive_failures = 0;
        entry.state = InternalState::Closed;
        entry.opened_at = None;
    }

    /// Whether `provider` may currently be retried. Advances Open -> HalfOpen
    /// when `open_duration` has elapsed, and decays a Closed circuit's
    /// failure counter after `reset_after_success` of quiet.
    pub fn can_retry(&self, provider: &str) -> bool {
        if provider.is_empty() {
            return true;
        }
        let key = Self::key(provider);
        let mut entries = self.entries.lock().expect("circuit breaker mutex poisoned");
        let entry = entries.entry(key.clone()).or_default();

        match entry.state {
            InternalState::Open => {
                let elapsed = entry.opened_at.map(|t| t.elapsed()).unwrap_or_default();
                if elapsed >= self.config.open_duration {
                    entry.state = InternalState::HalfOpen;
                    debug!(provider = %key, "circuit half-open, probe allowed");
                    true
                } else {
                    false
                }
            }
            InternalState::Closed => {
                if let Some(last) = entry.last_failure_at {
                    if last.elapsed() >= self.config.reset_after_success {
                        entry.consecutive_failures = 0;
                    }
                }
                true
            }
            InternalState::HalfOpen => true,
        }
    }

    /// Current state of the circuit for `provider`. Does not mutate state
    /// (unlike `can_retry`, which may advance Open -> HalfOpen).
    pub fn state(&self, provider: &str) -> CircuitState {
        if provider.is_empty() {
            return CircuitState::Closed;
        }
        let key = Self::key(provider);
        let entries = self.entries.lock().expect("circuit breaker mutex poisoned");
        match entries.get(&key) {
            None => CircuitState::Closed,
            Some(entry) => match entry.state {
                InternalState::Closed => CircuitState::Closed,
                InternalState::HalfOpen => CircuitState::HalfOpen,
                InternalState::Open => {
                    let elapsed = entry.opened_at.map(|t| t.elapsed()).unwrap_or_default();
                    if elapsed >= self.config.open_duration {
                        CircuitState::HalfOpen
                    } else {
                        CircuitState::Open
                    }
                }
            },
        }
    }

    /// Reset a single provider's circuit to Closed.
    pub fn reset(&self, provider: &str) {
        if provider.is_empty() {
            return;
        }
        let key = Self::key(provider);
        let mut entries = self.entries.lock().expect("circuit breaker mutex poisoned");
        entries.remove(&key);
    }

    /// Reset every provider's circuit to Closed.
    pub fn reset_all(&self) {
        let mut entries = self.entries.lock().expect("circuit breaker mutex poisoned");
        entries.clear();
    }
}

impl Default for ProviderCircuitBreaker {
    fn default() -> Self {
        Self::new(BreakerConfig::default())
    }
}
