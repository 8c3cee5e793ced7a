//! Error taxonomy for the Agent Runtime. Tool errors are recovered
//! locally (fed back into the conversation) and never appear here;
//! these variants are what escapes the loop to the caller.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("provider transient failure: {0}")]
    ProviderTransient(String),

    #[error("provider permanent failure: {0}")]
    ProviderPermanent(String),

    #[error("provider not configured: {0}")]
    ProviderNotConfigured(String),

    #[error("cancelled")]
    Cancelled,

    #[error("unknown error: {0}")]
    Unknown(String),
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;

impl RuntimeError {
    /// A short, truncated preview suitable for a user-visible one-liner
    /// (detailed messages may be truncated to 500 characters per §7).
    pub fn preview(&self) -> String {
        let full = self.to_string();
        if full.chars().count() <= 500 {
            full
        } else {
            full.chars().take(500).collect()
        }
    }
}
