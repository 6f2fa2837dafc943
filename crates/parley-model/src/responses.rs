// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! OpenAI Responses API adapter — used for `gpt-5*`, `o1*`, and `o3*` models.
//!
//! Unlike `/chat/completions`, the Responses API models the conversation as a
//! single flat item stream: message items, `function_call` items, and
//! `function_call_output` items all live side by side in `input`.  The SSE
//! stream is event-typed (`response.output_text.delta`,
//! `response.function_call_arguments.delta`, …) rather than delta-shaped,
//! and usage arrives on the `response.completed` event.

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use tracing::debug;

use crate::{
    backend::ResponseStream, tool_result_payload, CompletionRequest, ContentPart, Error, Message,
    ResponseEvent, Role, TokenUsage,
};

pub struct OpenAiResponsesBackend {
    model: String,
    api_key: Option<String>,
    /// Full responses URL, e.g. `https://api.openai.com/v1/responses`.
    responses_url: String,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    client: reqwest::Client,
}

impl OpenAiResponsesBackend {
    pub fn new(
        model: String,
        api_key: Option<String>,
        base_url: &str,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            model,
            api_key,
            responses_url: format!("{base}/responses"),
            max_tokens,
            temperature,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl crate::ChatBackend for OpenAiResponsesBackend {
    fn name(&self) -> &str {
        "openai-responses"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, req: CompletionRequest) -> Result<ResponseStream, Error> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| Error::MissingCredentials("OpenAI API key not set".into()))?;

        let input = build_response_items(&req.messages);

        let tools: Vec<Value> = req
            .tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.input_schema,
                })
            })
            .collect();

        let max_tokens = req
            .max_tokens
            .or(self.max_tokens)
            .unwrap_or_else(|| crate::catalog::max_output_tokens(&self.model));

        let mut body = json!({
            "model": self.model,
            "input": input,
            "stream": req.stream,
            "max_output_tokens": max_tokens,
        });
        if !req.system.is_empty() {
            body["instructions"] = json!(req.system);
        }
        // Reasoning models reject the temperature parameter entirely.
        let is_reasoning = self.model.starts_with("o1")
            || self.model.starts_with("o3")
            || self.model.starts_with("gpt-5");
        if !is_reasoning {
            if let Some(t) = req.temperature.or(self.temperature) {
                body["temperature"] = json!(t);
            }
        }
        if !tools.is_empty() {
            body["tools"] = json!(tools);
        }
        if let Some(format) = &req.response_format {
            body["text"] = json!({
                "format": {
                    "type": "json_schema",
                    "name": format.name,
                    "schema": format.schema,
                }
            });
        }

        debug!(
            model = %self.model,
            tool_count = tools.len(),
            item_count = input.as_array().map(|a| a.len()).unwrap_or(0),
            "sending responses request"
        );

        let resp = self
            .client
            .post(&self.responses_url)
            .bearer_auth(key)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::Transport(format!("OpenAI responses error {status}: {text}")));
        }

        let byte_stream = resp.bytes_stream();
        let event_stream = byte_stream
            .scan(String::new(), |buf, chunk| {
                let events: Vec<Result<ResponseEvent, Error>> = match chunk {
                    Ok(b) => {
                        buf.push_str(&String::from_utf8_lossy(&b));
                        let mut events = Vec::new();
                        while let Some(pos) = buf.find('\n') {
                            let line = buf[..pos].trim_end_matches('\r').to_string();
                            *buf = buf[pos + 1..].to_string();
                            if let Some(data) = line.strip_prefix("data: ") {
                                let data = data.trim();
                                if let Ok(v) = serde_json::from_str::<Value>(data) {
                                    events.extend(parse_response_event(&v).into_iter().map(Ok));
                                }
                            }
                        }
                        events
                    }
                    Err(e) => vec![Err(Error::Transport(e.to_string()))],
                };
                std::future::ready(Some(events))
            })
            .flat_map(futures::stream::iter);

        Ok(ResponseStream::new(event_stream))
    }
}

/// Parse one event-typed stream payload.
///
/// A single payload can yield zero, one, or two neutral events (the
/// `response.completed` event carries usage *and* terminates the stream).
pub(crate) fn parse_response_event(v: &Value) -> Vec<ResponseEvent> {
    match v["type"].as_str().unwrap_or("") {
        "response.output_text.delta" => {
            let delta = v["delta"].as_str().unwrap_or("").to_string();
            vec![ResponseEvent::TextDelta(delta)]
        }
        // A new function-call item opens a tool-call slot: id and name arrive
        // here, arguments stream separately keyed by output_index.
        "response.output_item.added" => {
            let item = &v["item"];
            if item["type"].as_str() == Some("function_call") {
                vec![ResponseEvent::ToolCallDelta {
                    index: v["output_index"].as_u64().unwrap_or(0) as u32,
                    id: item["call_id"].as_str().unwrap_or("").to_string(),
                    name: item["name"].as_str().unwrap_or("").to_string(),
                    arguments: item["arguments"].as_str().unwrap_or("").to_string(),
                }]
            } else {
                vec![]
            }
        }
        "response.function_call_arguments.delta" => {
            vec![ResponseEvent::ToolCallDelta {
                index: v["output_index"].as_u64().unwrap_or(0) as u32,
                id: String::new(),
                name: String::new(),
                arguments: v["delta"].as_str().unwrap_or("").to_string(),
            }]
        }
        "response.completed" => {
            let mut events = Vec::with_capacity(2);
            if let Some(usage) = v["response"].get("usage") {
                let input = usage["input_tokens"].as_u64().unwrap_or(0) as u32;
                let output = usage["output_tokens"].as_u64().unwrap_or(0) as u32;
                events.push(ResponseEvent::Usage(TokenUsage {
                    input_tokens: input,
                    output_tokens: output,
                    total_tokens: usage["total_tokens"]
                        .as_u64()
                        .map(|t| t as u32)
                        .unwrap_or(input + output),
                    cached_tokens: usage["input_tokens_details"]["cached_tokens"]
                        .as_u64()
                        .unwrap_or(0) as u32,
                }));
            }
            events.push(ResponseEvent::Done);
            events
        }
        "response.failed" | "response.incomplete" => {
            // Surfaced as Done; the accumulated text (possibly empty) is what
            // the caller gets.  Hard transport failures arrive as stream Errs.
            vec![ResponseEvent::Done]
        }
        _ => vec![],
    }
}

/// Convert neutral messages into the Responses API flat item array.
pub(crate) fn build_response_items(messages: &[Message]) -> Value {
    let mut items: Vec<Value> = Vec::with_capacity(messages.len());

    for m in messages {
        match m.role {
            Role::System | Role::User => {
                let text = m.joined_text();
                items.push(json!({
                    "role": if m.role == Role::System { "system" } else { "user" },
                    "content": [{ "type": "input_text", "text": text }],
                }));
            }
            Role::Assistant => {
                let text = m.joined_text();
                if !text.is_empty() {
                    items.push(json!({
                        "role": "assistant",
                        "content": [{ "type": "output_text", "text": text }],
                    }));
                }
                for p in &m.contents {
                    if let ContentPart::ToolCall { id, name, arguments } = p {
                        items.push(json!({
                            "type": "function_call",
                            "call_id": id,
                            "name": name,
                            "arguments": arguments,
                        }));
                    }
                }
            }
            Role::Tool => {
                let mut reminders: Vec<&str> = Vec::new();
                for p in &m.contents {
                    match p {
                        ContentPart::ToolResult { tool_call_id, content, error, .. } => {
                            items.push(json!({
                                "type": "function_call_output",
                                "call_id": tool_call_id,
                                "output": tool_result_payload(content, error).to_string(),
                            }));
                        }
                        ContentPart::SystemReminder { text } => reminders.push(text),
                        _ => {}
                    }
                }
                if !reminders.is_empty() {
                    items.push(json!({
                        "role": "user",
                        "content": [{ "type": "input_text", "text": reminders.join("\n") }],
                    }));
                }
            }
        }
    }

    json!(items)
}
