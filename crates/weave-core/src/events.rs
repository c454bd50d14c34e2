// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use weave_model::ToolCall;

/// Events emitted by the agent while it drives a single `run()` call.
/// Front-ends (console, Telegram dispatcher) subscribe to these to stream
/// output to the user as it arrives rather than waiting for the final text.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// A text chunk streamed from the model.
    TextDelta(String),
    /// The model has requested a tool call.
    ToolCallStarted(ToolCall),
    /// A tool call finished.
    ToolCallFinished {
        call_id: String,
        tool_name: String,
        output: String,
        is_error: bool,
    },
    /// The agent has finished processing the current user turn.
    TurnComplete,
    /// A recoverable error occurred.
    Error(String),
    /// The run was interrupted by a shutdown signal before completion.
    Interrupted,
}
