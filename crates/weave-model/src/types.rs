// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

/// A single message in the conversation history.
///
/// Mirrors the neutral message shape every provider adapter translates
/// to/from its own wire format: a role, optional text content, and (for
/// assistant turns) zero or more tool calls the model requested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Set when `role == Tool`: the id of the `ToolCall` this message answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Set when `role == Assistant` and the model requested tool calls.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self { role: Role::System, content: Some(text.into()), tool_call_id: None, tool_calls: Vec::new() }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, content: Some(text.into()), tool_call_id: None, tool_calls: Vec::new() }
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: Some(text.into()), tool_call_id: None, tool_calls: Vec::new() }
    }

    pub fn assistant_tool_calls(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self { role: Role::Assistant, content, tool_call_id: None, tool_calls }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_call_id: Some(tool_call_id.into()),
            tool_calls: Vec::new(),
        }
    }

    /// Plain text of this message, if any.
    pub fn as_text(&self) -> Option<&str> {
        self.content.as_deref()
    }

    /// The filter invariant from the data model: an assistant message is only
    /// valid to send to a provider if it carries text or tool calls (or both).
    /// Non-assistant messages are always considered well-formed here.
    pub fn is_well_formed(&self) -> bool {
        if self.role != Role::Assistant {
            return true;
        }
        self.content.as_ref().is_some_and(|c| !c.is_empty()) || !self.tool_calls.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool call requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// JSON-encoded argument object.
    pub arguments: String,
}

/// A tool definition advertised to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema of the parameters object.
    pub parameters: serde_json::Value,
}

/// Request sent to a model provider.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    pub max_tokens: u32,
}

/// A single streamed event from the model, as emitted by an adapter's
/// internal SSE-parsing stream before being assembled into an `LlmResponse`.
#[derive(Debug, Clone)]
pub enum ResponseEvent {
    TextDelta(String),
    /// The model wants to call a tool. `index` correlates the id/name-bearing
    /// event with subsequent argument-fragment deltas for the same call, since
    /// providers may stream tool-call arguments incrementally.
    ToolCall {
        index: u32,
        id: String,
        name: String,
        arguments: String,
    },
    Usage { input_tokens: u32, output_tokens: u32 },
    Done,
    Error(String),
}

/// The assembled, non-streaming result of one provider turn.
#[derive(Debug, Clone, Default)]
pub struct LlmResponse {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

impl LlmResponse {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
