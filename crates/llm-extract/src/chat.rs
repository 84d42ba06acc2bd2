//! Conversation messages and tool calls.
//!
//! A [`ChatMessage`] pairs a [`ChatRole`] with a list of
//! [`ContentBlock`]s. Most messages carry a single text block, so the
//! role-named constructors ([`ChatMessage::system`],
//! [`ChatMessage::user`], ...) cover the common case:
//!
//! ```rust
//! use llm_extract::chat::{ChatMessage, ChatRole};
//!
//! let msg = ChatMessage::user("What is the capital of France?");
//! assert_eq!(msg.role, ChatRole::User);
//! assert_eq!(msg.text(), Some("What is the capital of France?"));
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum ChatRole {
    /// Instructions that frame the whole exchange.
    System,
    /// The human (or application) side of the conversation.
    User,
    /// The model.
    Assistant,
    /// The output of a tool invocation, fed back to the model.
    Tool,
}

/// A single piece of message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ContentBlock {
    /// Plain text.
    Text(String),
    /// A request from the model to invoke a tool.
    ToolCall(ToolCall),
    /// The result of a tool invocation.
    ToolResult(ToolResult),
}

/// A model's request to invoke a named tool with JSON arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned call identifier.
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// Parsed JSON arguments.
    pub arguments: Value,
}

/// The outcome of a tool invocation, addressed to a [`ToolCall::id`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    /// The [`ToolCall::id`] this result answers.
    pub tool_call_id: String,
    /// Tool output, usually text or serialized JSON.
    pub content: String,
    /// Whether the tool failed.
    pub is_error: bool,
}

/// One message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The author of this message.
    pub role: ChatRole,
    /// Content blocks, in order.
    pub content: Vec<ContentBlock>,
}

impl ChatMessage {
    fn text_with_role(role: ChatRole, text: impl Into<String>) -> Self {
        Self {
            role,
            content: vec![ContentBlock::Text(text.into())],
        }
    }

    /// A system message with a single text block.
    pub fn system(text: impl Into<String>) -> Self {
        Self::text_with_role(ChatRole::System, text)
    }

    /// A user message with a single text block.
    pub fn user(text: impl Into<String>) -> Self {
        Self::text_with_role(ChatRole::User, text)
    }

    /// An assistant message with a single text block.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::text_with_role(ChatRole::Assistant, text)
    }

    /// A tool-role message carrying the result for `tool_call_id`.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Tool,
            content: vec![ContentBlock::ToolResult(ToolResult {
                tool_call_id: tool_call_id.into(),
                content: content.into(),
                is_error: false,
            })],
        }
    }

    /// Returns the first text block, if any.
    pub fn text(&self) -> Option<&str> {
        self.content.iter().find_map(|b| match b {
            ContentBlock::Text(t) => Some(t.as_str()),
            _ => None,
        })
    }

    /// Returns every tool call in this message.
    pub fn tool_calls(&self) -> Vec<&ToolCall> {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolCall(call) => Some(call),
                _ => None,
            })
            .collect()
    }
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum StopReason {
    /// The model finished its turn.
    EndTurn,
    /// The model stopped to call one or more tools.
    ToolUse,
    /// The output hit the token limit.
    MaxTokens,
}
