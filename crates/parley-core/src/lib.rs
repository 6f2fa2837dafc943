// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Provider-agnostic chat orchestration: a streaming message loop with
//! tool-call execution over interchangeable LLM back-ends.
//!
//! The [`Client`] resolves a back-end from a model name; a [`Chat`] owns the
//! conversation history, usage counters, and registered tools, and drives
//! the model-call → tool-execution → model-call loop until the model
//! produces a final textual answer.

mod chat;
mod client;
mod context;
mod events;
mod registry;
mod session;


pub use chat::{Chat, TurnOptions};
pub use client::Client;
pub use context::{ReminderFn, TurnContext};
pub use events::{StreamCallback, StreamEvent, ToolCallEvent, ToolResultEvent};
pub use registry::{tool_fn, FnHandler, ToolEntry, ToolHandler, ToolRegistry};
pub use session::{SessionState, SessionUsage};

// The neutral model types are part of this crate's public API surface.
pub use parley_model::{
    ClientConfig, ContentPart, Error, Message, ResponseFormat, Role, TokenUsage, ToolDef,
};
