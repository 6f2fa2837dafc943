// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream;

use crate::{
    backend::ResponseStream, CompletionRequest, Error, ResponseEvent, Role, TokenUsage,
};

/// Deterministic mock back-end for tests.  Echoes the last user message back
/// as the assistant response.
#[derive(Default)]
pub struct MockBackend;

#[async_trait]
impl crate::ChatBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }
    fn model_name(&self) -> &str {
        "mock-model"
    }

    async fn complete(&self, req: CompletionRequest) -> Result<ResponseStream, Error> {
        let reply = req
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.joined_text())
            .unwrap_or_else(|| "[no input]".into());

        let events: Vec<Result<ResponseEvent, Error>> = vec![
            Ok(ResponseEvent::TextDelta(format!("MOCK: {reply}"))),
            Ok(ResponseEvent::Usage(TokenUsage {
                input_tokens: 10,
                output_tokens: 10,
                total_tokens: 20,
                cached_tokens: 0,
            })),
            Ok(ResponseEvent::Done),
        ];
        Ok(ResponseStream::new(stream::iter(events)))
    }
}

/// An event scripted to occur on one mock completion call.
///
/// `Err(msg)` items surface as mid-stream transport errors.
pub type ScriptedEvent = Result<ResponseEvent, String>;

/// A pre-scripted mock back-end.  Each `complete` call pops the next response
/// script from the front of the queue, so tests can specify exact event
/// sequences — including tool calls and mid-stream failures — without
/// network access.
pub struct ScriptedMockBackend {
    scripts: Mutex<Vec<Vec<ScriptedEvent>>>,
    /// Every `CompletionRequest` seen by this back-end, in call order.
    /// Written on each `complete()` call so tests can inspect what was sent.
    pub requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl ScriptedMockBackend {
    /// Build a back-end from a list of response scripts.  The outer `Vec` is
    /// the ordered list of calls; the inner `Vec` is the event sequence for
    /// that call.
    pub fn new(scripts: Vec<Vec<ScriptedEvent>>) -> Self {
        Self {
            scripts: Mutex::new(scripts),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Convenience: a back-end that always returns a single text reply with
    /// a small usage observation.
    pub fn always_text(reply: impl Into<String>) -> Self {
        let r = reply.into();
        Self::new(vec![vec![
            Ok(ResponseEvent::TextDelta(r)),
            Ok(ResponseEvent::Usage(TokenUsage {
                input_tokens: 5,
                output_tokens: 5,
                total_tokens: 10,
                cached_tokens: 0,
            })),
            Ok(ResponseEvent::Done),
        ]])
    }

    /// Convenience: one tool call round followed by a text reply.
    pub fn tool_then_text(
        tool_id: impl Into<String>,
        tool_name: impl Into<String>,
        args_json: impl Into<String>,
        final_text: impl Into<String>,
    ) -> Self {
        Self::new(vec![
            vec![
                Ok(ResponseEvent::ToolCallDelta {
                    index: 0,
                    id: tool_id.into(),
                    name: tool_name.into(),
                    arguments: args_json.into(),
                }),
                Ok(ResponseEvent::Usage(TokenUsage {
                    input_tokens: 8,
                    output_tokens: 4,
                    total_tokens: 12,
                    cached_tokens: 0,
                })),
                Ok(ResponseEvent::Done),
            ],
            vec![
                Ok(ResponseEvent::TextDelta(final_text.into())),
                Ok(ResponseEvent::Usage(TokenUsage {
                    input_tokens: 12,
                    output_tokens: 2,
                    total_tokens: 14,
                    cached_tokens: 0,
                })),
                Ok(ResponseEvent::Done),
            ],
        ])
    }

    /// The request sent on call `n` (0-based), if it happened.
    pub fn request(&self, n: usize) -> Option<CompletionRequest> {
        self.requests.lock().unwrap().get(n).cloned()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl crate::ChatBackend for ScriptedMockBackend {
    fn name(&self) -> &str {
        "scripted-mock"
    }
    fn model_name(&self) -> &str {
        "scripted-mock-model"
    }

    async fn complete(&self, req: CompletionRequest) -> Result<ResponseStream, Error> {
        self.requests.lock().unwrap().push(req);
        let events = {
            let mut scripts = self.scripts.lock().unwrap();
            if scripts.is_empty() {
                vec![
                    Ok(ResponseEvent::TextDelta("[no more scripts]".into())),
                    Ok(ResponseEvent::Done),
                ]
            } else {
                scripts.remove(0)
            }
        };
        let wrapped: Vec<Result<ResponseEvent, Error>> = events
            .into_iter()
            .map(|e| e.map_err(Error::Transport))
            .collect();
        Ok(ResponseStream::new(stream::iter(wrapped)))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
