// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! OpenAI-style `/chat/completions` adapter.
//!
//! Serves both the hosted OpenAI endpoint and self-hosted OpenAI-compatible
//! servers (Ollama, vLLM, LM Studio), which differ only in base URL and
//! authentication.
//!
//! # Wire shape
//! Roles are `system` / `user` / `assistant` / `tool`.  All tool calls of one
//! assistant turn travel in a single `tool_calls` array; each tool response is
//! a separate `role: tool` message keyed by `tool_call_id`.  Streaming is SSE
//! with per-choice deltas; tool-call arguments arrive as string fragments
//! keyed by the call's `index`.  Usage arrives in a terminal chunk when
//! `stream_options.include_usage` is set.

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use tracing::debug;

use crate::{
    backend::ResponseStream, tool_result_payload, CompletionRequest, ContentPart, Error, Message,
    ResponseEvent, Role, TokenUsage,
};

/// How to attach the API key to requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStyle {
    /// `Authorization: Bearer <key>` — the hosted endpoint.
    Bearer,
    /// No authentication header — self-hosted servers.
    None,
}

pub struct OpenAiChatBackend {
    driver_name: &'static str,
    model: String,
    api_key: Option<String>,
    /// Full chat completions URL, e.g. `https://api.openai.com/v1/chat/completions`.
    chat_url: String,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    auth_style: AuthStyle,
    client: reqwest::Client,
}

impl OpenAiChatBackend {
    pub fn new(
        driver_name: &'static str,
        model: String,
        api_key: Option<String>,
        base_url: &str,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
        auth_style: AuthStyle,
    ) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            driver_name,
            model,
            api_key,
            chat_url: format!("{base}/chat/completions"),
            max_tokens,
            temperature,
            auth_style,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl crate::ChatBackend for OpenAiChatBackend {
    fn name(&self) -> &str {
        self.driver_name
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, req: CompletionRequest) -> Result<ResponseStream, Error> {
        let messages = build_chat_messages(&req.system, &req.messages);

        let tools: Vec<Value> = req
            .tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.input_schema,
                    }
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
            "stream": req.stream,
            "max_tokens": max_tokens,
            "stream_options": { "include_usage": true },
        });
        if let Some(t) = req.temperature.or(self.temperature) {
            body["temperature"] = json!(t);
        }
        if !tools.is_empty() {
            body["tools"] = json!(tools);
        }
        if let Some(format) = &req.response_format {
            body["response_format"] = json!({
                "type": "json_schema",
                "json_schema": {
                    "name": format.name,
                    "schema": format.schema,
                }
            });
        }

        debug!(
            driver = %self.driver_name,
            model = %self.model,
            tool_count = tools.len(),
            message_count = messages.len(),
            "sending chat completion request"
        );

        let mut http_req = self.client.post(&self.chat_url).json(&body);
        http_req = match self.auth_style {
            AuthStyle::Bearer => {
                let key = self.api_key.as_deref().ok_or_else(|| {
                    Error::MissingCredentials(format!("{} API key not set", self.driver_name))
                })?;
                http_req.bearer_auth(key)
            }
            AuthStyle::None => http_req,
        };

        let resp = http_req.send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::Transport(format!(
                "{} error {status}: {text}",
                self.driver_name
            )));
        }

        let byte_stream = resp.bytes_stream();
        // SSE events can be split across TCP packets.  Maintain a line buffer
        // across chunks; emit events only for complete lines.
        let event_stream = byte_stream
            .scan(String::new(), |buf, chunk| {
                let events: Vec<Result<ResponseEvent, Error>> = match chunk {
                    Ok(b) => {
                        buf.push_str(&String::from_utf8_lossy(&b));
                        drain_complete_sse_lines(buf)
                    }
                    Err(e) => vec![Err(Error::Transport(e.to_string()))],
                };
                std::future::ready(Some(events))
            })
            .flat_map(futures::stream::iter);

        Ok(ResponseStream::new(event_stream))
    }
}

/// Parse a single complete SSE `data:` line into a [`ResponseEvent`].
///
/// Returns `None` for empty lines, comment lines, or unparseable data.
fn parse_sse_data_line(line: &str) -> Option<Result<ResponseEvent, Error>> {
    let data = line.strip_prefix("data: ")?.trim();
    if data.is_empty() {
        return None;
    }
    if data == "[DONE]" {
        return Some(Ok(ResponseEvent::Done));
    }
    let v: Value = serde_json::from_str(data).ok()?;
    Some(Ok(parse_sse_chunk(&v)))
}

/// Drain all complete `\n`-terminated SSE lines from `buf`.
///
/// Any trailing incomplete line is left in `buf` so it can be extended by the
/// next TCP chunk.  A single SSE event may be split across multiple packets.
pub(crate) fn drain_complete_sse_lines(buf: &mut String) -> Vec<Result<ResponseEvent, Error>> {
    let mut events = Vec::new();
    while let Some(nl_pos) = buf.find('\n') {
        let line = buf[..nl_pos].trim_end_matches('\r').to_string();
        *buf = buf[nl_pos + 1..].to_string();
        if let Some(ev) = parse_sse_data_line(&line) {
            events.push(ev);
        }
    }
    events
}

pub(crate) fn parse_sse_chunk(v: &Value) -> ResponseEvent {
    // Usage-only chunk (emitted when stream_options.include_usage is set).
    if let Some(usage) = v.get("usage").filter(|u| !u.is_null()) {
        let input = usage["prompt_tokens"].as_u64().unwrap_or(0) as u32;
        let output = usage["completion_tokens"].as_u64().unwrap_or(0) as u32;
        let cached = usage
            .get("prompt_tokens_details")
            .and_then(|d| d.get("cached_tokens"))
            .and_then(|t| t.as_u64())
            .unwrap_or(0) as u32;
        return ResponseEvent::Usage(TokenUsage {
            input_tokens: input,
            output_tokens: output,
            total_tokens: usage["total_tokens"]
                .as_u64()
                .map(|t| t as u32)
                .unwrap_or(input + output),
            cached_tokens: cached,
        });
    }

    let delta = &v["choices"][0]["delta"];

    // Tool call delta.  Each SSE chunk carries one tool-call delta in
    // practice; the "index" field routes accumulation across parallel calls.
    if let Some(tc) = delta.get("tool_calls").and_then(|a| a.get(0)) {
        return ResponseEvent::ToolCallDelta {
            index: tc["index"].as_u64().unwrap_or(0) as u32,
            id: tc["id"].as_str().unwrap_or("").to_string(),
            name: tc["function"]["name"].as_str().unwrap_or("").to_string(),
            arguments: tc["function"]["arguments"].as_str().unwrap_or("").to_string(),
        };
    }

    // Text delta
    if let Some(text) = delta.get("content").and_then(|c| c.as_str()) {
        return ResponseEvent::TextDelta(text.to_string());
    }

    ResponseEvent::TextDelta(String::new())
}

/// Convert the system prompt and neutral messages into the OpenAI wire array.
///
/// Extracted as a free function so it can be unit-tested without HTTP.
///
/// Wire constraints honored here:
/// - All `ToolCall` parts of one assistant message travel in a single
///   `tool_calls` array.
/// - Each `ToolResult` part becomes its own `role: tool` message, and those
///   must directly follow the assistant `tool_calls` turn.  A
///   `SystemReminder` part riding on a tool message therefore serializes as
///   a `user` message *after* the tool responses.
/// - Assistant messages with no effective content produce no wire items.
pub(crate) fn build_chat_messages(system: &str, messages: &[Message]) -> Vec<Value> {
    let mut out: Vec<Value> = Vec::with_capacity(messages.len() + 1);
    if !system.is_empty() {
        out.push(json!({ "role": "system", "content": system }));
    }

    for m in messages {
        match m.role {
            Role::System => {
                let text = m.joined_text();
                if !text.is_empty() {
                    out.push(json!({ "role": "system", "content": text }));
                }
            }
            Role::User => {
                out.push(json!({ "role": "user", "content": m.joined_text() }));
            }
            Role::Assistant => {
                let calls: Vec<Value> = m
                    .contents
                    .iter()
                    .filter_map(|p| match p {
                        ContentPart::ToolCall { id, name, arguments } => Some(json!({
                            "id": id,
                            "type": "function",
                            "function": { "name": name, "arguments": arguments },
                        })),
                        _ => None,
                    })
                    .collect();
                let text = m.joined_text();
                if !calls.is_empty() {
                    let mut msg = json!({ "role": "assistant", "tool_calls": calls });
                    if !text.is_empty() {
                        msg["content"] = json!(text);
                    }
                    out.push(msg);
                } else if !text.is_empty() {
                    out.push(json!({ "role": "assistant", "content": text }));
                }
                // Empty assistant turns are dropped.
            }
            Role::Tool => {
                let mut reminders: Vec<&str> = Vec::new();
                for p in &m.contents {
                    match p {
                        ContentPart::ToolResult { tool_call_id, content, error, .. } => {
                            let payload = tool_result_payload(content, error);
                            out.push(json!({
                                "role": "tool",
                                "tool_call_id": tool_call_id,
                                "content": payload.to_string(),
                            }));
                        }
                        ContentPart::SystemReminder { text } => reminders.push(text),
                        _ => {}
                    }
                }
                if !reminders.is_empty() {
                    out.push(json!({ "role": "user", "content": reminders.join("\n") }));
                }
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChatBackend;

    fn make_backend() -> OpenAiChatBackend {
        OpenAiChatBackend::new(
            "openai",
            "gpt-4o".into(),
            Some("sk-test".into()),
            "https://api.openai.com/v1",
            Some(1024),
            Some(0.0),
            AuthStyle::Bearer,
        )
    }

    #[test]
    fn name_and_model() {
        let b = make_backend();
        assert_eq!(b.name(), "openai");
        assert_eq!(b.model_name(), "gpt-4o");
    }

    #[test]
    fn chat_url_appends_path() {
        let b = make_backend();
        assert_eq!(b.chat_url, "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn base_url_trailing_slash_stripped() {
        let b = OpenAiChatBackend::new(
            "self-hosted",
            "llama3".into(),
            None,
            "http://localhost:11434/v1/",
            None,
            None,
            AuthStyle::None,
        );
        assert_eq!(b.chat_url, "http://localhost:11434/v1/chat/completions");
    }

    // ── parse_sse_chunk ───────────────────────────────────────────────────────

    #[test]
    fn parse_sse_text_delta() {
        let v = serde_json::json!({
            "choices": [{ "delta": { "content": "hello" } }]
        });
        let ev = parse_sse_chunk(&v);
        assert!(matches!(ev, ResponseEvent::TextDelta(t) if t == "hello"));
    }

    #[test]
    fn parse_sse_no_content_no_tools_is_empty_text_delta() {
        let v = serde_json::json!({ "choices": [{ "delta": {} }] });
        let ev = parse_sse_chunk(&v);
        assert!(matches!(ev, ResponseEvent::TextDelta(t) if t.is_empty()));
    }

    #[test]
    fn parse_sse_tool_call_start_with_id_and_name() {
        let v = serde_json::json!({
            "choices": [{
                "delta": {
                    "tool_calls": [{
                        "index": 0,
                        "id": "call_abc",
                        "function": { "name": "add", "arguments": "" }
                    }]
                }
            }]
        });
        let ev = parse_sse_chunk(&v);
        assert!(
            matches!(&ev, ResponseEvent::ToolCallDelta { index, id, name, arguments }
                if *index == 0 && id == "call_abc" && name == "add" && arguments.is_empty()),
            "unexpected event: {ev:?}"
        );
    }

    #[test]
    fn parse_sse_tool_call_args_fragment_keeps_index() {
        let v = serde_json::json!({
            "choices": [{
                "delta": {
                    "tool_calls": [{
                        "index": 2,
                        "function": { "arguments": "{\"a\": " }
                    }]
                }
            }]
        });
        let ev = parse_sse_chunk(&v);
        assert!(
            matches!(&ev, ResponseEvent::ToolCallDelta { index, arguments, .. }
                if *index == 2 && arguments == "{\"a\": "),
            "unexpected event: {ev:?}"
        );
    }

    #[test]
    fn parse_sse_usage_event() {
        let v = serde_json::json!({
            "usage": { "prompt_tokens": 100, "completion_tokens": 50, "total_tokens": 150 }
        });
        let ev = parse_sse_chunk(&v);
        assert!(
            matches!(ev, ResponseEvent::Usage(u)
                if u.input_tokens == 100 && u.output_tokens == 50 && u.total_tokens == 150),
            "unexpected event: {ev:?}"
        );
    }

    #[test]
    fn parse_sse_usage_missing_total_is_summed() {
        let v = serde_json::json!({
            "usage": { "prompt_tokens": 7, "completion_tokens": 3 }
        });
        let ev = parse_sse_chunk(&v);
        assert!(matches!(ev, ResponseEvent::Usage(u) if u.total_tokens == 10));
    }

    #[test]
    fn parse_sse_usage_cached_tokens() {
        let v = serde_json::json!({
            "usage": {
                "prompt_tokens": 200,
                "completion_tokens": 40,
                "prompt_tokens_details": { "cached_tokens": 150 }
            }
        });
        let ev = parse_sse_chunk(&v);
        assert!(matches!(ev, ResponseEvent::Usage(u) if u.cached_tokens == 150));
    }

    #[test]
    fn parse_sse_null_usage_falls_through_to_delta() {
        let v = serde_json::json!({
            "usage": null,
            "choices": [{ "delta": { "content": "hi" } }]
        });
        let ev = parse_sse_chunk(&v);
        assert!(matches!(ev, ResponseEvent::TextDelta(t) if t == "hi"));
    }

    // ── SSE line-buffer handling ──────────────────────────────────────────────

    #[test]
    fn drain_complete_lines_handles_single_complete_line() {
        let line = r#"{"choices":[{"delta":{"content":"hi"}}]}"#;
        let mut buf = format!("data: {line}\n");
        let events = drain_complete_sse_lines(&mut buf);
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], Ok(ResponseEvent::TextDelta(t)) if t == "hi"));
        assert!(buf.is_empty(), "buffer should be drained");
    }

    #[test]
    fn drain_complete_lines_retains_incomplete_last_line() {
        let partial = "data: {\"choices\":[{\"delta\":{\"content\":\"hel";
        let mut buf = partial.to_string();
        let events = drain_complete_sse_lines(&mut buf);
        assert!(events.is_empty(), "no complete line yet");
        assert_eq!(buf, partial, "partial line must stay in buffer");
    }

    #[test]
    fn sse_event_split_across_two_chunks_is_parsed_correctly() {
        let full_line = r#"data: {"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1","function":{"name":"add","arguments":""}}]}}]}"#;
        let split = full_line.len() / 2;

        let mut buf = String::new();
        buf.push_str(&full_line[..split]);
        assert!(drain_complete_sse_lines(&mut buf).is_empty());
        assert!(!buf.is_empty(), "buffer must hold partial line");

        buf.push_str(&full_line[split..]);
        buf.push('\n');
        let events = drain_complete_sse_lines(&mut buf);
        assert_eq!(events.len(), 1);
        match &events[0] {
            Ok(ResponseEvent::ToolCallDelta { index, id, name, .. }) => {
                assert_eq!(*index, 0);
                assert_eq!(id, "call_1");
                assert_eq!(name, "add");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn multiple_sse_events_in_one_tcp_chunk_all_parsed() {
        let chunk = concat!(
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"c0\",\"function\":{\"name\":\"add\",\"arguments\":\"\"}}]}}]}\n",
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":1,\"id\":\"c1\",\"function\":{\"name\":\"sub\",\"arguments\":\"\"}}]}}]}\n",
        );
        let mut buf = chunk.to_string();
        let events = drain_complete_sse_lines(&mut buf);
        assert_eq!(events.len(), 2);
        assert!(
            matches!(&events[0], Ok(ResponseEvent::ToolCallDelta { index: 0, .. }))
        );
        assert!(
            matches!(&events[1], Ok(ResponseEvent::ToolCallDelta { index: 1, .. }))
        );
    }

    #[test]
    fn done_event_is_parsed_correctly() {
        let mut buf = "data: [DONE]\n".to_string();
        let events = drain_complete_sse_lines(&mut buf);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Ok(ResponseEvent::Done)));
    }

    #[test]
    fn windows_crlf_line_endings_are_handled() {
        let line = r#"{"choices":[{"delta":{"content":"hi"}}]}"#;
        let mut buf = format!("data: {line}\r\n");
        let events = drain_complete_sse_lines(&mut buf);
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], Ok(ResponseEvent::TextDelta(t)) if t == "hi"));
    }

    // ── Message serialization ─────────────────────────────────────────────────

    #[test]
    fn system_prompt_becomes_leading_system_message() {
        let json = build_chat_messages("be brief", &[Message::user("hi")]);
        assert_eq!(json[0]["role"], "system");
        assert_eq!(json[0]["content"], "be brief");
        assert_eq!(json[1]["role"], "user");
    }

    #[test]
    fn empty_system_prompt_is_omitted() {
        let json = build_chat_messages("", &[Message::user("hi")]);
        assert_eq!(json.len(), 1);
        assert_eq!(json[0]["role"], "user");
    }

    #[test]
    fn reminder_part_joined_into_user_content() {
        let m = Message {
            role: Role::User,
            contents: vec![
                ContentPart::reminder("branch: main"),
                ContentPart::text("what changed?"),
            ],
            timestamp: None,
        };
        let json = build_chat_messages("", &[m]);
        assert_eq!(json[0]["content"], "branch: main\nwhat changed?");
    }

    #[test]
    fn assistant_tool_calls_coalesced_into_one_message() {
        let m = Message {
            role: Role::Assistant,
            contents: vec![
                ContentPart::tool_call("call_1", "glob", r#"{"pattern":"*.c"}"#),
                ContentPart::tool_call("call_2", "read_file", r#"{"path":"main.c"}"#),
            ],
            timestamp: None,
        };
        let results = Message::tool_results(vec![
            ContentPart::tool_result("call_1", "glob", "found 3 files"),
            ContentPart::tool_result("call_2", "read_file", "int main() {}"),
        ]);
        let json = build_chat_messages("", &[m, results]);
        // One assistant message + two tool messages.
        assert_eq!(json.len(), 3);
        assert_eq!(json[0]["role"], "assistant");
        let calls = json[0]["tool_calls"].as_array().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0]["id"], "call_1");
        assert_eq!(calls[1]["id"], "call_2");
        assert_eq!(json[1]["role"], "tool");
        assert_eq!(json[1]["tool_call_id"], "call_1");
        assert_eq!(json[2]["tool_call_id"], "call_2");
    }

    #[test]
    fn tool_result_error_serialized_as_error_payload() {
        let results = Message::tool_results(vec![ContentPart::tool_error(
            "c1",
            "divide",
            "divide by zero",
        )]);
        let json = build_chat_messages("", &[results]);
        let content = json[0]["content"].as_str().unwrap();
        let payload: Value = serde_json::from_str(content).unwrap();
        assert_eq!(payload, serde_json::json!({ "error": "divide by zero" }));
    }

    #[test]
    fn empty_tool_result_serialized_as_success_payload() {
        let results = Message::tool_results(vec![ContentPart::tool_result("c1", "noop", "")]);
        let json = build_chat_messages("", &[results]);
        let payload: Value =
            serde_json::from_str(json[0]["content"].as_str().unwrap()).unwrap();
        assert_eq!(payload, serde_json::json!({ "result": "success" }));
    }

    #[test]
    fn reminder_on_tool_message_rides_after_tool_responses() {
        let m = Message {
            role: Role::Tool,
            contents: vec![
                ContentPart::reminder("current time: noon"),
                ContentPart::tool_result("c1", "clock", "12:00"),
            ],
            timestamp: None,
        };
        let json = build_chat_messages("", &[m]);
        assert_eq!(json.len(), 2);
        assert_eq!(json[0]["role"], "tool");
        assert_eq!(json[1]["role"], "user");
        assert_eq!(json[1]["content"], "current time: noon");
    }

    #[test]
    fn empty_assistant_turn_is_dropped() {
        let m = Message {
            role: Role::Assistant,
            contents: vec![ContentPart::text("")],
            timestamp: None,
        };
        let json = build_chat_messages("", &[m, Message::user("hi")]);
        assert_eq!(json.len(), 1);
        assert_eq!(json[0]["role"], "user");
    }

    #[test]
    fn assistant_text_alongside_tool_calls_is_kept() {
        let m = Message {
            role: Role::Assistant,
            contents: vec![
                ContentPart::text("let me check"),
                ContentPart::tool_call("c1", "add", "{}"),
            ],
            timestamp: None,
        };
        let json = build_chat_messages("", &[m]);
        assert_eq!(json[0]["content"], "let me check");
        assert_eq!(json[0]["tool_calls"].as_array().unwrap().len(), 1);
    }
}
