//! The `Provider` capability the Agent Runtime calls each iteration.
//! Model-provider HTTP clients themselves are an external collaborator;
//! this trait is the seam the runtime is written against.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::RuntimeError;
use crate::types::{Message, ProviderResponse};

/// A tool available to the provider, advertised by name/description/
/// input schema each call.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// One chunk of a streaming response. The runtime accumulates text
/// chunks and, per §4.8, treats the final accumulation as an `end_turn`
/// response — streaming never carries tool calls.
#[derive(Debug, Clone)]
pub struct StreamChunk {
    pub text: String,
}

/// A remote model provider. Implementations own their own HTTP client,
/// auth, and retry-at-the-transport-level concerns; the runtime only
/// calls these two methods and interprets the result.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider name as used by the circuit breaker / error classifier
    /// (e.g. `"openai"`, `"anthropic"`).
    fn name(&self) -> &str;

    async fn send_message(
        &self,
        conversation: &[Message],
        tools: &[ToolSpec],
        system_prompt: &str,
    ) -> Result<ProviderResponse, RuntimeError>;

    /// Streaming variant. Returns `None` if the provider doesn't support
    /// streaming; the runtime falls back to [`Self::send_message`].
    async fn send_message_streaming(
        &self,
        _conversation: &[Message],
        _tools: &[ToolSpec],
        _system_prompt: &str,
        _on_chunk: &(dyn Fn(StreamChunk) + Send + Sync),
    ) -> Result<Option<ProviderResponse>, RuntimeError> {
        Ok(None)
    }
}
