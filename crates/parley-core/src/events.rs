// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use parley_model::Error;

/// A finalized tool call, with fully assembled arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCallEvent {
    pub id: String,
    pub name: String,
    /// Complete raw JSON argument document.
    pub arguments: String,
}

/// The outcome of one tool execution, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResultEvent {
    pub tool_call_id: String,
    pub name: String,
    pub content: String,
    pub error: String,
}

/// Events delivered to the caller's streaming callback, in the order they
/// occur within one `message` call.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A textual delta from the model.
    Content { text: String },
    /// Tool calls finalized in one round.
    ToolCall { tool_calls: Vec<ToolCallEvent> },
    /// Tool results produced in one round.
    ToolResult { tool_results: Vec<ToolResultEvent> },
}

/// Streaming callback.  Returning an error aborts the stream as if the turn
/// had been cancelled; the error is returned from `message`.
pub type StreamCallback = Arc<dyn Fn(&StreamEvent) -> Result<(), Error> + Send + Sync>;
