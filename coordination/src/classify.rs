//! Error Classifier — classifies a failure message as Transient, Permanent,
//! or Unknown so callers (the circuit breaker, the scheduler) can decide
//! whether a retry is worth attempting.
//!
//! Classification is a pure lowercased-substring match against two ordered
//! pattern lists. Transient wins when both lists match the same message —
//! a provider that returns "internal server error: invalid api key" should
//! still be retried, since 500s are frequently transient infrastructure
//! blips that happen to carry a misleading body.

use serde::{Deserialize, Serialize};

/// Classification of a failure message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Likely to succeed on retry (rate limits, timeouts, 5xx).
    Transient,
    /// Will not succeed on retry without a change to the request (4xx,
    /// auth, malformed input).
    Permanent,
    /// Empty/null message — nothing to classify.
    Unknown,
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transient => write!(f, "transient"),
            Self::Permanent => write!(f, "permanent"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

const TRANSIENT_PATTERNS: &[&str] = &[
    "network",
    "timeout",
    "timed out",
    "connection",
    "socket",
    "429",
    "500",
    "502",
    "503",
    "504",
    "rate limit",
    "overloaded",
    "quota exceeded",
    "try again later",
    "throttled",
];

const PERMANENT_PATTERNS: &[&str] = &[
    "400",
    "401",
    "403",
    "404",
    "unauthorized",
    "invalid api key",
    "forbidden",
    "content policy",
    "syntax error",
    "invalid json",
    "schema violation",
    "not found",
    "model not found",
];

/// Classify a failure message. Empty or whitespace-only input is `Unknown`.
/// A message matching neither list is `Permanent` — safer than retrying
/// forever on an error we don't recognize.
pub fn classify(message: &str) -> ErrorClass {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return ErrorClass::Unknown;
    }

    let lower = trimmed.to_lowercase();

    if TRANSIENT_PATTERNS.iter().any(|p| lower.contains(p)) {
        return ErrorClass::Transient;
    }
    if PERMANENT_PATTERNS.iter().any(|p| lower.contains(p)) {
        return ErrorClass::Permanent;
    }
    ErrorClass::Permanent
}

/// Convenience wrapper: is this message transient?
pub fn is_transient(message: &str) -> bool {
    classify(message) == ErrorClass::Transient
}

/// Convenience wrapper: is this message permanent?
pub fn is_permanent(message: &str) -> bool {
    classify(message) == ErrorClass::Permanent
}
