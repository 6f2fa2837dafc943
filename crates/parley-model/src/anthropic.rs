// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Anthropic Messages API adapter.
//!
//! The system prompt travels out-of-band in a top-level `system` field and
//! conversation turns must alternate user/assistant.  Tool calls are
//! `tool_use` content blocks with a structured `input` object; tool results
//! are `tool_result` blocks on the next user turn.  Streaming uses
//! content-block start/delta/stop events; tool-call arguments arrive as
//! `input_json_delta` fragments that must be concatenated before parsing.
//! Usage is split across `message_start` (input) and `message_delta` (output).

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::{
    backend::ResponseStream, tool_result_payload, CompletionRequest, ContentPart, Error, Message,
    ResponseEvent, Role, TokenUsage,
};

pub struct AnthropicBackend {
    model: String,
    api_key: Option<String>,
    base_url: String,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    client: reqwest::Client,
}

impl AnthropicBackend {
    pub fn new(
        model: String,
        api_key: Option<String>,
        base_url: Option<String>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Self {
        Self {
            model,
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.anthropic.com".into()),
            max_tokens,
            temperature,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl crate::ChatBackend for AnthropicBackend {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, req: CompletionRequest) -> Result<ResponseStream, Error> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| Error::MissingCredentials("ANTHROPIC_API_KEY not set".into()))?;

        let messages = build_anthropic_messages(&req.messages);

        let tools: Vec<Value> = req
            .tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "input_schema": t.input_schema,
                })
            })
            .collect();

        let max_tokens = req
            .max_tokens
            .or(self.max_tokens)
            .unwrap_or_else(|| crate::catalog::max_output_tokens(&self.model));

        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": max_tokens,
            "stream": req.stream,
        });
        if let Some(t) = req.temperature.or(self.temperature) {
            body["temperature"] = json!(t);
        }

        // No native structured-output support: the schema constraint is
        // expressed as a directive appended to the system text.
        let system = match &req.response_format {
            Some(f) => {
                let directive = structured_output_directive(&f.name, &f.schema);
                if req.system.is_empty() {
                    directive
                } else {
                    format!("{}\n\n{directive}", req.system)
                }
            }
            None => req.system.clone(),
        };
        if !system.is_empty() {
            body["system"] = json!(system);
        }
        if !tools.is_empty() {
            body["tools"] = json!(tools);
        }

        debug!(
            model = %self.model,
            tool_count = tools.len(),
            message_count = messages.len(),
            "sending anthropic request"
        );

        let resp = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::Transport(format!("Anthropic error {status}: {text}")));
        }

        let byte_stream = resp.bytes_stream();
        // SSE lines can be split across TCP chunks; carry a remainder buffer
        // forward and parse only complete lines.
        let event_stream = byte_stream
            .scan(String::new(), |buf, chunk| {
                let text = match chunk {
                    Ok(b) => String::from_utf8_lossy(&b).to_string(),
                    Err(e) => {
                        return futures::future::ready(Some(vec![Err(Error::Transport(
                            e.to_string(),
                        ))]));
                    }
                };
                buf.push_str(&text);
                let mut events = Vec::new();
                while let Some(pos) = buf.find('\n') {
                    let line = buf[..pos].trim_end_matches('\r').to_string();
                    buf.drain(..=pos);
                    if let Some(data) = line.strip_prefix("data: ") {
                        let data = data.trim();
                        if let Ok(v) = serde_json::from_str::<Value>(data) {
                            if let Some(ev) = parse_anthropic_event(&v) {
                                events.push(Ok(ev));
                            }
                        }
                    }
                }
                futures::future::ready(Some(events))
            })
            .flat_map(futures::stream::iter);

        Ok(ResponseStream::new(event_stream))
    }
}

fn structured_output_directive(name: &str, schema: &Value) -> String {
    format!(
        "Respond with a single JSON document (no prose, no code fences) that \
         conforms to the schema named {name:?}:\n{schema}"
    )
}

/// Map one Anthropic stream event onto the neutral model.
///
/// Returns `None` for events that carry nothing (ping, block stops,
/// signature deltas).
pub(crate) fn parse_anthropic_event(v: &Value) -> Option<ResponseEvent> {
    match v["type"].as_str().unwrap_or("") {
        "content_block_start" => {
            let index = v["index"].as_u64().unwrap_or(0) as u32;
            let block = &v["content_block"];
            if block["type"].as_str() == Some("tool_use") {
                Some(ResponseEvent::ToolCallDelta {
                    index,
                    id: block["id"].as_str().unwrap_or("").to_string(),
                    name: block["name"].as_str().unwrap_or("").to_string(),
                    arguments: String::new(),
                })
            } else {
                None
            }
        }
        "content_block_delta" => {
            let index = v["index"].as_u64().unwrap_or(0) as u32;
            let delta = &v["delta"];
            match delta["type"].as_str().unwrap_or("") {
                "text_delta" => {
                    let text = delta["text"].as_str().unwrap_or("").to_string();
                    Some(ResponseEvent::TextDelta(text))
                }
                "input_json_delta" => Some(ResponseEvent::ToolCallDelta {
                    index,
                    id: String::new(),
                    name: String::new(),
                    arguments: delta["partial_json"].as_str().unwrap_or("").to_string(),
                }),
                _ => None,
            }
        }
        "message_start" => {
            let usage = v["message"].get("usage")?;
            let input = usage["input_tokens"].as_u64().unwrap_or(0) as u32;
            Some(ResponseEvent::Usage(TokenUsage {
                input_tokens: input,
                output_tokens: 0,
                total_tokens: input,
                cached_tokens: usage["cache_read_input_tokens"].as_u64().unwrap_or(0) as u32,
            }))
        }
        "message_delta" => {
            let usage = v.get("usage")?;
            let output = usage["output_tokens"].as_u64().unwrap_or(0) as u32;
            Some(ResponseEvent::Usage(TokenUsage {
                input_tokens: 0,
                output_tokens: output,
                total_tokens: output,
                cached_tokens: 0,
            }))
        }
        "message_stop" => Some(ResponseEvent::Done),
        _ => None,
    }
}

/// Convert neutral messages into the Anthropic wire format.
///
/// The system prompt is handled by the caller (top-level `system` field).
/// Every message serializes to content-block form, and consecutive wire
/// messages with the same role are merged so the strict user/assistant
/// alternation requirement always holds — tool turns map to `user`, which
/// would otherwise produce user-after-user sequences.
pub(crate) fn build_anthropic_messages(messages: &[Message]) -> Vec<Value> {
    let mut out: Vec<(String, Vec<Value>)> = Vec::new();

    for m in messages {
        let role = match m.role {
            Role::Assistant => "assistant",
            // System text inside the history is folded into the nearest user
            // turn; the real system prompt never reaches this function.
            Role::User | Role::Tool | Role::System => "user",
        };

        let mut blocks: Vec<Value> = Vec::new();
        // Reminder blocks lead the turn so injected context precedes results.
        for p in &m.contents {
            if let ContentPart::SystemReminder { text } = p {
                blocks.push(json!({ "type": "text", "text": text }));
            }
        }
        for p in &m.contents {
            match p {
                ContentPart::Text { text } if !text.is_empty() => {
                    blocks.push(json!({ "type": "text", "text": text }));
                }
                ContentPart::ToolCall { id, name, arguments } => {
                    // tool_use.id must match ^[a-zA-Z0-9_-]+$; an empty id
                    // arises only when a content_block_start was missing from
                    // the stream, and would fail the request with a 400.
                    let safe_id = if id.is_empty() {
                        warn!(tool_name = %name, "tool call has empty id; substituting fallback");
                        "tc_fallback".to_string()
                    } else {
                        id.clone()
                    };
                    blocks.push(json!({
                        "type": "tool_use",
                        "id": safe_id,
                        "name": name,
                        "input": serde_json::from_str::<Value>(arguments).unwrap_or(json!({})),
                    }));
                }
                ContentPart::ToolResult { tool_call_id, content, error, .. } => {
                    let mut block = json!({
                        "type": "tool_result",
                        "tool_use_id": tool_call_id,
                        "content": tool_result_payload(content, error).to_string(),
                    });
                    if !error.is_empty() {
                        block["is_error"] = json!(true);
                    }
                    blocks.push(block);
                }
                _ => {}
            }
        }

        if blocks.is_empty() {
            continue;
        }

        match out.last_mut() {
            Some((last_role, last_blocks)) if *last_role == role => {
                last_blocks.extend(blocks);
            }
            _ => out.push((role.to_string(), blocks)),
        }
    }

    out.into_iter()
        .map(|(role, content)| json!({ "role": role, "content": content }))
        .collect()
}
