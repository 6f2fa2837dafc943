// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use tracing::warn;

use parley_model::{
    ChatBackend, CompletionRequest, ContentPart, Error, Message, ResponseEvent, ResponseFormat,
    Role,
};

use crate::{
    context::TurnContext,
    events::{StreamCallback, StreamEvent, ToolCallEvent, ToolResultEvent},
    registry::{ToolHandler, ToolRegistry},
    session::{SessionState, SessionUsage},
};

/// Per-turn options.  All fields are optional and independent; unset fields
/// fall back to the client configuration.
#[derive(Clone, Default)]
pub struct TurnOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub response_format: Option<ResponseFormat>,
    pub on_event: Option<StreamCallback>,
}

impl TurnOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.temperature = Some(t);
        self
    }

    pub fn max_tokens(mut self, n: u32) -> Self {
        self.max_tokens = Some(n);
        self
    }

    /// Request structured JSON output conforming to `schema`.
    pub fn response_format(mut self, name: impl Into<String>, schema: serde_json::Value) -> Self {
        self.response_format = Some(ResponseFormat {
            name: name.into(),
            schema,
        });
        self
    }

    /// Attach a streaming callback.  A returned error aborts the stream and
    /// becomes the result of `message`.
    pub fn on_event(
        mut self,
        f: impl Fn(&StreamEvent) -> Result<(), Error> + Send + Sync + 'static,
    ) -> Self {
        self.on_event = Some(Arc::new(f));
        self
    }
}

/// In-progress tool call assembled from stream fragments, keyed by the
/// provider's slot index.
#[derive(Default)]
struct ToolCallSlot {
    id: String,
    name: String,
    args_buf: String,
}

impl ToolCallSlot {
    /// Finalize the slot: parse accumulated arguments as JSON (only now —
    /// never incrementally) and patch up identifiers the provider omitted.
    ///
    /// Returns `None` for a slot with no name; such a call cannot be
    /// dispatched and forwarding it would corrupt the next request.
    fn finish(self, fallback_idx: usize) -> Option<ToolCallEvent> {
        if self.name.is_empty() {
            warn!(tool_call_id = %self.id, "dropping tool call with empty name");
            return None;
        }
        let arguments = if self.args_buf.is_empty() {
            "{}".to_string()
        } else if serde_json::from_str::<serde_json::Value>(&self.args_buf).is_ok() {
            self.args_buf
        } else {
            warn!(
                tool_name = %self.name,
                args = %self.args_buf,
                "tool call arguments are not valid JSON; substituting {{}}"
            );
            "{}".to_string()
        };
        let id = if self.id.is_empty() {
            let synthetic = format!("tc_synthetic_{fallback_idx}");
            warn!(tool_name = %self.name, id = %synthetic, "tool call had no id; generated one");
            synthetic
        } else {
            self.id
        };
        Some(ToolCallEvent {
            id,
            name: self.name,
            arguments,
        })
    }
}

/// A stateful conversational session bound to one back-end, owning history
/// and registered tools.
///
/// All operations are safe under concurrent invocation; `Clone` yields
/// another handle onto the same session.  Turn effects on history are
/// serialized through the session mutex: the records of one committed turn
/// are contiguous and never interleave with another turn's.
#[derive(Clone)]
pub struct Chat {
    backend: Arc<dyn ChatBackend>,
    state: Arc<SessionState>,
    tools: Arc<ToolRegistry>,
    default_temperature: Option<f32>,
    default_max_tokens: Option<u32>,
}

impl Chat {
    pub(crate) fn new(
        backend: Arc<dyn ChatBackend>,
        system_prompt: impl Into<String>,
        initial_messages: Vec<Message>,
        default_temperature: Option<f32>,
        default_max_tokens: Option<u32>,
    ) -> Self {
        Self {
            backend,
            state: Arc::new(SessionState::new(system_prompt, initial_messages)),
            tools: Arc::new(ToolRegistry::new()),
            default_temperature,
            default_max_tokens,
        }
    }

    /// Register a tool for this chat.  Replacing a name keeps its slot in
    /// the offer order.  A registration or removal during an in-flight
    /// `message` call does not affect that call: each request reads the
    /// registry snapshot current at its round.
    pub fn register_tool(
        &self,
        def: parley_model::ToolDef,
        handler: impl ToolHandler + 'static,
    ) -> Result<(), Error> {
        self.tools.register(def, handler)
    }

    pub fn deregister_tool(&self, name: &str) {
        self.tools.deregister(name);
    }

    pub fn list_tools(&self) -> Vec<String> {
        self.tools.list()
    }

    pub fn history(&self) -> (String, Vec<Message>) {
        self.state.history()
    }

    pub fn token_usage(&self) -> SessionUsage {
        self.state.token_usage()
    }

    /// Effective output-token cap for this chat.
    pub fn max_tokens(&self) -> u32 {
        self.default_max_tokens
            .unwrap_or_else(|| self.backend.max_output_tokens())
    }

    /// Send one user message and drive the turn to completion.
    ///
    /// The turn streams the model response, executes any requested tools,
    /// and re-enters the model until it produces a final textual answer.
    /// Only the outgoing user message (with any injected reminder part) and
    /// the final assistant message are appended to history — intermediate
    /// tool hops live solely in the outbound request.  Transport errors,
    /// cancellation, and callback errors abort the turn with history
    /// untouched.
    pub async fn message(
        &self,
        ctx: &TurnContext,
        msg: Message,
        opts: TurnOptions,
    ) -> Result<Message, Error> {
        if msg.is_empty() {
            return Err(Error::InvalidArgument(
                "message must have at least one content part".into(),
            ));
        }
        if let Some(f) = &opts.response_format {
            if f.name.is_empty() {
                return Err(Error::InvalidArgument(
                    "response format name must not be empty".into(),
                ));
            }
        }
        if ctx.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let mut user_msg = msg;
        if let Some(text) = ctx.reminder_text() {
            user_msg.contents.insert(0, ContentPart::reminder(text));
        }

        let (system, history) = self.state.snapshot();
        let mut outbound = history;
        outbound.push(user_msg.clone());

        loop {
            let req = CompletionRequest {
                system: system.clone(),
                messages: outbound.clone(),
                tools: self.tools.defs(),
                temperature: opts.temperature.or(self.default_temperature),
                max_tokens: opts.max_tokens.or(self.default_max_tokens),
                response_format: opts.response_format.clone(),
                stream: true,
            };

            let mut stream = self.backend.complete(req).await?;

            let mut text_buf = String::new();
            let mut slots: HashMap<u32, ToolCallSlot> = HashMap::new();

            loop {
                let event = tokio::select! {
                    biased;
                    _ = ctx.cancel_token().cancelled() => return Err(Error::Cancelled),
                    ev = stream.next() => ev,
                };
                let event = match event {
                    None => break,
                    Some(ev) => ev?,
                };
                match event {
                    ResponseEvent::TextDelta(delta) if !delta.is_empty() => {
                        text_buf.push_str(&delta);
                        self.emit(&opts, StreamEvent::Content { text: delta })?;
                    }
                    ResponseEvent::TextDelta(_) => {}
                    ResponseEvent::ToolCallDelta {
                        index,
                        id,
                        name,
                        arguments,
                    } => {
                        let slot = slots.entry(index).or_default();
                        if !id.is_empty() {
                            slot.id = id;
                        }
                        if !name.is_empty() {
                            slot.name = name;
                        }
                        slot.args_buf.push_str(&arguments);
                    }
                    // Applied immediately: cumulative sums every delta while
                    // last-message reflects the latest observation.
                    ResponseEvent::Usage(u) => self.state.update_usage(u),
                    ResponseEvent::Done => break,
                }
            }

            // Finalize accumulated slots in provider index order.
            let mut pending: Vec<(u32, ToolCallSlot)> = slots.into_iter().collect();
            pending.sort_by_key(|(idx, _)| *idx);
            let calls: Vec<ToolCallEvent> = pending
                .into_iter()
                .enumerate()
                .filter_map(|(i, (_, slot))| slot.finish(i))
                .collect();

            if calls.is_empty() {
                if text_buf.is_empty() {
                    warn!(model = %self.backend.model_name(), "model produced an empty final response");
                }
                let assistant = Message::assistant(text_buf);
                self.state
                    .append_messages(vec![user_msg, assistant.clone()], None);
                return Ok(assistant);
            }

            for call in &calls {
                self.emit(
                    &opts,
                    StreamEvent::ToolCall {
                        tool_calls: vec![call.clone()],
                    },
                )?;
            }

            // The assistant hop joins the outbound request so the provider
            // sees its own calls next round, but it is never persisted.
            let mut hop_parts: Vec<ContentPart> = Vec::with_capacity(calls.len() + 1);
            if !text_buf.is_empty() {
                hop_parts.push(ContentPart::text(text_buf));
            }
            hop_parts.extend(
                calls
                    .iter()
                    .map(|c| ContentPart::tool_call(&c.id, &c.name, &c.arguments)),
            );
            outbound.push(Message {
                role: Role::Assistant,
                contents: hop_parts,
                timestamp: None,
            });

            let mut results: Vec<ToolResultEvent> = Vec::with_capacity(calls.len());
            for call in &calls {
                // Cancellation between handlers ends the turn; the handler
                // already running is allowed to finish.
                if ctx.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                let result = match self.tools.execute(ctx, &call.name, &call.arguments).await {
                    Ok(content) => ToolResultEvent {
                        tool_call_id: call.id.clone(),
                        name: call.name.clone(),
                        content,
                        error: String::new(),
                    },
                    // Unknown tools and handler failures become error results
                    // fed back to the model; the turn continues.
                    Err(e) => {
                        let error = match e {
                            Error::ToolExecution(msg) => msg,
                            other => other.to_string(),
                        };
                        ToolResultEvent {
                            tool_call_id: call.id.clone(),
                            name: call.name.clone(),
                            content: String::new(),
                            error,
                        }
                    }
                };
                self.emit(
                    &opts,
                    StreamEvent::ToolResult {
                        tool_results: vec![result.clone()],
                    },
                )?;
                results.push(result);
            }
            if ctx.is_cancelled() {
                return Err(Error::Cancelled);
            }

            // Reminders are evaluated lazily each round and lead the
            // tool-results turn; adapters place them on the wire wherever
            // their protocol allows.
            let mut tool_parts: Vec<ContentPart> = Vec::with_capacity(results.len() + 1);
            if let Some(text) = ctx.reminder_text() {
                tool_parts.push(ContentPart::reminder(text));
            }
            for r in results {
                tool_parts.push(if r.error.is_empty() {
                    ContentPart::tool_result(r.tool_call_id, r.name, r.content)
                } else {
                    ContentPart::tool_error(r.tool_call_id, r.name, r.error)
                });
            }
            outbound.push(Message {
                role: Role::Tool,
                contents: tool_parts,
                timestamp: None,
            });
        }
    }

    fn emit(&self, opts: &TurnOptions, event: StreamEvent) -> Result<(), Error> {
        match &opts.on_event {
            Some(cb) => cb(&event),
            None => Ok(()),
        }
    }
}
