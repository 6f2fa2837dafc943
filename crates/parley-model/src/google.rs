// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Google Gemini adapter — native Generative Language API.
//!
//! Uses the `streamGenerateContent?alt=sse` endpoint.  Roles on the wire are
//! `user` and `model`; tool results live in a `user` turn as
//! `functionResponse` parts matched to calls by function *name*, and
//! assistant tool calls are `functionCall` parts carrying a structured `args`
//! map that is re-serialized to raw JSON on the way into the neutral model.
//! Usage arrives as `usageMetadata` attached to chunks.
//!
//! Two provider quirks are handled here:
//! - A non-empty system prompt is folded into the first `user` turn because
//!   the API does not accept a dedicated system role on all paths.
//! - `functionCall` parts carry no id, so a synthetic one is generated to
//!   keep the neutral-model invariants (every call has an id) intact.

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use tracing::debug;

use crate::{
    backend::ResponseStream, tool_result_payload, CompletionRequest, ContentPart, Error, Message,
    ResponseEvent, Role, TokenUsage,
};

pub struct GoogleBackend {
    model: String,
    api_key: Option<String>,
    base_url: String,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    client: reqwest::Client,
}

impl GoogleBackend {
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
            base_url: base_url
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com".into()),
            max_tokens,
            temperature,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl crate::ChatBackend for GoogleBackend {
    fn name(&self) -> &str {
        "google"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, req: CompletionRequest) -> Result<ResponseStream, Error> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| Error::MissingCredentials("GEMINI_API_KEY not set".into()))?;

        let contents = build_gemini_contents(&req.system, &req.messages);

        let max_tokens = req
            .max_tokens
            .or(self.max_tokens)
            .unwrap_or_else(|| crate::catalog::max_output_tokens(&self.model));

        let mut generation_config = json!({
            "maxOutputTokens": max_tokens,
        });
        if let Some(t) = req.temperature.or(self.temperature) {
            generation_config["temperature"] = json!(t);
        }
        if let Some(format) = &req.response_format {
            generation_config["responseMimeType"] = json!("application/json");
            generation_config["responseSchema"] = format.schema.clone();
        }

        let mut body = json!({
            "contents": contents,
            "generationConfig": generation_config,
        });
        if !req.tools.is_empty() {
            let function_declarations: Vec<Value> = req
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.input_schema,
                    })
                })
                .collect();
            body["tools"] = json!([{ "functionDeclarations": function_declarations }]);
        }

        let url = format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse&key={}",
            self.base_url.trim_end_matches('/'),
            self.model,
            key
        );

        debug!(model = %self.model, "sending Gemini request");

        let resp = self.client.post(&url).json(&body).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::Transport(format!("Gemini error {status}: {text}")));
        }

        let byte_stream = resp.bytes_stream();
        // State carried across chunks: the SSE line buffer and a counter
        // handing each functionCall part its own slot index (the API reports
        // no per-call index; without distinct slots parallel calls would be
        // concatenated into one).
        let event_stream = byte_stream
            .scan((String::new(), 0u32), |(buf, call_seq), chunk| {
                let text = match chunk {
                    Ok(b) => String::from_utf8_lossy(&b).to_string(),
                    Err(e) => {
                        return futures::future::ready(Some(vec![Err(Error::Transport(
                            e.to_string(),
                        ))]));
                    }
                };
                buf.push_str(&text);
                let mut events: Vec<Result<ResponseEvent, Error>> = Vec::new();
                while let Some(pos) = buf.find('\n') {
                    let line = buf[..pos].trim_end_matches('\r').to_string();
                    buf.drain(..=pos);
                    if let Some(data) = line.strip_prefix("data: ") {
                        let data = data.trim();
                        if let Ok(v) = serde_json::from_str::<Value>(data) {
                            events.extend(parse_gemini_chunk(&v, call_seq).into_iter().map(Ok));
                        }
                    }
                }
                futures::future::ready(Some(events))
            })
            .flat_map(futures::stream::iter);

        Ok(ResponseStream::new(event_stream))
    }
}

/// Parse one streamed candidate chunk.
///
/// Text and function calls can interleave inside one candidate's parts, so a
/// single chunk may yield several events.  `call_seq` assigns each
/// functionCall a fresh slot index and feeds the synthetic id.
pub(crate) fn parse_gemini_chunk(v: &Value, call_seq: &mut u32) -> Vec<ResponseEvent> {
    let mut events = Vec::new();

    if let Some(parts) = v["candidates"][0]["content"]["parts"].as_array() {
        for part in parts {
            if let Some(fc) = part.get("functionCall") {
                let name = fc["name"].as_str().unwrap_or("").to_string();
                let args = serde_json::to_string(&fc["args"]).unwrap_or_else(|_| "{}".into());
                let index = *call_seq;
                *call_seq += 1;
                events.push(ResponseEvent::ToolCallDelta {
                    id: format!("call_{index}_{name}"),
                    index,
                    name,
                    arguments: args,
                });
            } else if let Some(text) = part["text"].as_str() {
                if !text.is_empty() {
                    events.push(ResponseEvent::TextDelta(text.to_string()));
                }
            }
        }
    }

    // usageMetadata can ride on the same chunk as content parts.
    if let Some(meta) = v.get("usageMetadata") {
        let input = meta["promptTokenCount"].as_u64().unwrap_or(0) as u32;
        let output = meta["candidatesTokenCount"].as_u64().unwrap_or(0) as u32;
        events.push(ResponseEvent::Usage(TokenUsage {
            input_tokens: input,
            output_tokens: output,
            total_tokens: meta["totalTokenCount"]
                .as_u64()
                .map(|t| t as u32)
                .unwrap_or(input + output),
            cached_tokens: meta["cachedContentTokenCount"].as_u64().unwrap_or(0) as u32,
        }));
    }

    if v["candidates"][0]["finishReason"].as_str().is_some() {
        events.push(ResponseEvent::Done);
    }

    events
}

/// Convert the system prompt and neutral messages into the Gemini `contents`
/// array.  The system prompt, when present, is folded into the first user
/// turn as a leading text part.
pub(crate) fn build_gemini_contents(system: &str, messages: &[Message]) -> Vec<Value> {
    let mut contents: Vec<Value> = Vec::with_capacity(messages.len());

    for m in messages {
        let role = match m.role {
            Role::Assistant => "model",
            Role::User | Role::Tool | Role::System => "user",
        };
        let mut parts: Vec<Value> = Vec::new();
        for p in &m.contents {
            match p {
                ContentPart::Text { text } | ContentPart::SystemReminder { text } => {
                    if !text.is_empty() {
                        parts.push(json!({ "text": text }));
                    }
                }
                ContentPart::ToolCall { name, arguments, .. } => {
                    let args: Value = serde_json::from_str(arguments).unwrap_or(json!({}));
                    parts.push(json!({
                        "functionCall": { "name": name, "args": args }
                    }));
                }
                ContentPart::ToolResult { name, content, error, .. } => {
                    parts.push(json!({
                        "functionResponse": {
                            "name": name,
                            "response": tool_result_payload(content, error),
                        }
                    }));
                }
            }
        }
        if parts.is_empty() {
            continue;
        }
        contents.push(json!({ "role": role, "parts": parts }));
    }

    if !system.is_empty() {
        let sys_part = json!({ "text": system });
        match contents
            .iter_mut()
            .find(|c| c["role"].as_str() == Some("user"))
        {
            Some(first_user) => {
                let parts = first_user["parts"].as_array_mut().expect("parts array");
                parts.insert(0, sys_part);
            }
            None => {
                contents.insert(0, json!({ "role": "user", "parts": [sys_part] }));
            }
        }
    }

    contents
}
