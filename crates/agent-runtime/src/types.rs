//! Message and content types flowing through the Agent Runtime loop.

use serde::{Deserialize, Serialize};

/// A conversation role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

/// One block of an assistant message's content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
}

/// The content carried by one message. User/tool messages are usually a
/// single text block or a list of tool results; assistant messages may
/// carry several content blocks (interleaved text and tool_use).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Blocks(Vec<ContentBlock>),
    ToolResults(Vec<ToolResult>),
}

/// The result of dispatching one `tool_use` block.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    #[serde(rename = "type")]
    pub kind: ToolResultKind,
    pub tool_use_id: String,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolResultKind {
    ToolResult,
}

impl ToolResult {
    pub fn new(tool_use_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            kind: ToolResultKind::ToolResult,
            tool_use_id: tool_use_id.into(),
            content: content.into(),
        }
    }

    /// A `tool_use` result is treated as an error when its content starts
    /// with `"Error:"` (case-insensitive).
    pub fn is_error(&self) -> bool {
        self.content.to_lowercase().starts_with("error:")
    }
}

/// A single message in the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Content,
}

impl Message {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Content::Text(text.into()),
        }
    }

    pub fn assistant(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            content: Content::Blocks(blocks),
        }
    }

    pub fn tool_results(results: Vec<ToolResult>) -> Self {
        Self {
            role: Role::User,
            content: Content::ToolResults(results),
        }
    }

    /// The concatenated text of every `text` block, or the whole string
    /// for a plain `Content::Text` message.
    pub fn text(&self) -> String {
        match &self.content {
            Content::Text(t) => t.clone(),
            Content::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::Text { text } => Some(text.clone()),
                    ContentBlock::ToolUse { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
            Content::ToolResults(_) => String::new(),
        }
    }

    pub fn tool_use_blocks(&self) -> Vec<(&str, &str, &serde_json::Value)> {
        match &self.content {
            Content::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::ToolUse { id, name, input } => {
                        Some((id.as_str(), name.as_str(), input))
                    }
                    ContentBlock::Text { .. } => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Why the provider stopped generating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StopReason {
    ToolUse,
    EndTurn,
    Error { message: String },
    NotConfigured { message: String },
    Other(String),
}

/// A provider's response to one `SendMessage` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub content: Vec<ContentBlock>,
    pub stop_reason: StopReason,
}
