//! The synchronous send-dispatch-feedback tool loop driving one agent
//! conversation to completion.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{RuntimeError, RuntimeResult};
use crate::options::AgentOptions;
use crate::provider::{Provider, StreamChunk, ToolSpec};
use crate::tool::Tool;
use crate::types::{Content, ContentBlock, Message, Role, StopReason, ToolResult};

/// `(type, content)` progress events; see the runtime contract doc on
/// [`ProgressType`] for the enumerated `type` values.
pub type ProgressCallback = Arc<dyn Fn(ProgressType, &str) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressType {
    Info,
    Warning,
    Error,
    ToolCall,
    ToolResult,
    Assistant,
    AssistantStream,
    AssistantFinal,
}

/// Drives one agent conversation against a provider and a fixed tool
/// registry until the provider emits `end_turn`/`error`/`NotConfigured`,
/// an unrecognized stop reason, or iterations are exhausted.
pub struct AgentRuntime {
    provider: Arc<dyn Provider>,
    tools: HashMap<String, Arc<dyn Tool>>,
    tool_specs: Vec<ToolSpec>,
    options: AgentOptions,
    on_progress: Option<ProgressCallback>,
}

impl AgentRuntime {
    pub fn new(provider: Arc<dyn Provider>, options: AgentOptions) -> Self {
        Self {
            provider,
            tools: HashMap::new(),
            tool_specs: Vec::new(),
            options,
            on_progress: None,
        }
    }

    pub fn with_tool(mut self, spec: ToolSpec, tool: Arc<dyn Tool>) -> Self {
        self.tools.insert(spec.name.clone(), tool);
        self.tool_specs.push(spec);
        self
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    fn emit(&self, kind: ProgressType, content: &str) {
        if let Some(cb) = &self.on_progress {
            cb(kind, content);
        }
    }

    /// Runs the loop to completion, starting from `conversation` seeded
    /// with at least the task's initial user message.
    pub async fn run(
        &self,
        mut conversation: Vec<Message>,
        system_prompt: &str,
    ) -> RuntimeResult<Vec<Message>> {
        if self.options.enable_streaming {
            match self.run_streaming(&conversation, system_prompt).await {
                Ok(Some(final_message)) => {
                    conversation.push(final_message);
                    return Ok(conversation);
                }
                Ok(None) => {}
                Err(err) if self.options.streaming_fallback_to_sync => {
                    self.emit(
                        ProgressType::Warning,
                        &format!("streaming failed, falling back to sync: {err}"),
                    );
                }
                Err(err) => return Err(err),
            }
        }
        self.run_sync(conversation, system_prompt).await
    }

    async fn run_streaming(
        &self,
        conversation: &[Message],
        system_prompt: &str,
    ) -> RuntimeResult<Option<Message>> {
        let chunks: std::sync::Mutex<Vec<String>> = std::sync::Mutex::new(Vec::new());
        let on_chunk = |chunk: StreamChunk| {
            chunks.lock().unwrap().push(chunk.text.clone());
            self.emit(ProgressType::AssistantStream, &chunk.text);
        };
        let response = self
            .provider
            .send_message_streaming(conversation, &self.tool_specs, system_prompt, &on_chunk)
            .await?;
        match response {
            Some(resp) => {
                let text: String = chunks.into_inner().unwrap().join("");
                let text = if text.is_empty() { resp.content.iter().filter_map(|b| match b {
                    ContentBlock::Text { text } => Some(text.clone()),
                    _ => None,
                }).collect::<Vec<_>>().join("") } else { text };
                self.emit(ProgressType::AssistantFinal, &text);
                Ok(Some(Message::assistant(vec![ContentBlock::Text { text }])))
            }
            None => Ok(None),
        }
    }

    async fn run_sync(
        &self,
        mut conversation: Vec<Message>,
        system_prompt: &str,
    ) -> RuntimeResult<Vec<Message>> {
        let max_iterations = self.options.max_iterations.max(1);
        for iteration in 1..=max_iterations {
            self.emit(ProgressType::Info, &format!("iteration {iteration}"));
            let response = self
                .provider
                .send_message(&conversation, &self.tool_specs, system_prompt)
                .await?;
            conversation.push(Message::assistant(response.content.clone()));

            match &response.stop_reason {
                StopReason::ToolUse => {
                    let tool_uses: Vec<(String, String, serde_json::Value)> = response
                        .content
                        .iter()
                        .filter_map(|b| match b {
                            ContentBlock::ToolUse { id, name, input } => {
                                Some((id.clone(), name.clone(), input.clone()))
                            }
                            ContentBlock::Text { .. } => None,
                        })
                        .collect();

                    let mut results = Vec::with_capacity(tool_uses.len());
                    for (id, name, input) in &tool_uses {
                        self.emit(ProgressType::ToolCall, name);
                        let output = match self.tools.get(name) {
                            Some(tool) => tool.execute(&self.options.working_directory, input).await,
                            None => format!("Error: unknown tool '{name}'"),
                        };
                        self.emit(ProgressType::ToolResult, &output);
                        results.push(ToolResult::new(id.clone(), output));
                    }

                    let all_failed = !results.is_empty() && results.iter().all(ToolResult::is_error);
                    conversation.push(Message::tool_results(results));

                    if iteration >= max_iterations {
                        self.emit(ProgressType::Warning, "max iterations reached after tool dispatch");
                        return Ok(conversation);
                    }
                    if all_failed {
                        self.emit(ProgressType::Warning, "all tools failed this iteration, allowing one more");
                    }
                }
                StopReason::EndTurn => {
                    for text in response
                        .content
                        .iter()
                        .filter_map(|b| match b {
                            ContentBlock::Text { text } => Some(text.as_str()),
                            ContentBlock::ToolUse { .. } => None,
                        })
                    {
                        self.emit(ProgressType::AssistantFinal, text);
                    }
                    return Ok(conversation);
                }
                StopReason::Error { message } => {
                    self.emit(ProgressType::Error, message);
                    ensure_error_text(&mut conversation, message);
                    return Err(RuntimeError::ProviderTransient(message.clone()));
                }
                StopReason::NotConfigured { message } => {
                    self.emit(ProgressType::Error, message);
                    ensure_error_text(&mut conversation, message);
                    return Err(RuntimeError::ProviderNotConfigured(message.clone()));
                }
                StopReason::Other(reason) => {
                    self.emit(ProgressType::Warning, &format!("unrecognized stop reason: {reason}"));
                    return Ok(conversation);
                }
            }
        }
        self.emit(ProgressType::Warning, "max iterations reached");
        Ok(conversation)
    }
}

/// Ensures the just-appended assistant message carries a visible text
/// block describing the error, synthesizing one if the provider didn't
/// supply any text content alongside the error stop reason.
fn ensure_error_text(conversation: &mut [Message], message: &str) {
    if let Some(last) = conversation.last_mut() {
        if last.role == Role::Assistant {
            let has_text = matches!(&last.content, Content::Blocks(blocks) if blocks.iter().any(|b| matches!(b, ContentBlock::Text { .. })));
            if !has_text {
                if let Content::Blocks(blocks) = &mut last.content {
                    blocks.push(ContentBlock::Text {
                        text: format!("Error: {message}"),
                    });
                }
            }
        }
    }
}
