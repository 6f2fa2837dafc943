// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Wire-format tests: spin up a minimal HTTP/1.1 mock server, point each
//! adapter at it, issue a `CompletionRequest`, and assert both the HTTP
//! request the adapter sent and the `ResponseEvent`s it emitted.
//!
//! These tests run without API keys and without external network access.
//! They exercise the full adapter pipeline: serialisation → HTTP → SSE
//! parsing.

use futures::StreamExt;
use parley_model::{
    from_config, ClientConfig, CompletionRequest, ContentPart, Error, Message, ResponseEvent,
    ResponseFormat, Role, ToolDef,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

// ── Minimal HTTP/1.1 mock server ──────────────────────────────────────────────

#[derive(Debug)]
struct CapturedRequest {
    method: String,
    path: String,
    headers: HashMap<String, String>,
    body: Value,
}

/// Bind a one-shot HTTP/1.1 mock server on a random loopback port.  It
/// accepts exactly one request, captures it, and replies with the given
/// status + body.
async fn mock_server_once(
    status: u16,
    content_type: &'static str,
    resp_body: impl Into<String> + Send + 'static,
) -> (u16, tokio::sync::oneshot::Receiver<CapturedRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (tx, rx) = tokio::sync::oneshot::channel::<CapturedRequest>();

    tokio::spawn(async move {
        let resp_body: String = resp_body.into();
        let (stream, _) = listener.accept().await.expect("accept");
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let mut request_line = String::new();
        reader.read_line(&mut request_line).await.unwrap();
        let request_line = request_line.trim().to_string();
        let mut parts = request_line.splitn(3, ' ');
        let method = parts.next().unwrap_or("").to_string();
        let path = parts.next().unwrap_or("").to_string();

        let mut headers: HashMap<String, String> = HashMap::new();
        let mut content_length: usize = 0;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            let trimmed = line.trim();
            if trimmed.is_empty() {
                break;
            }
            if let Some((k, v)) = trimmed.split_once(": ") {
                let key = k.to_lowercase();
                if key == "content-length" {
                    content_length = v.parse().unwrap_or(0);
                }
                headers.insert(key, v.to_string());
            }
        }

        let mut body_bytes = vec![0u8; content_length];
        reader.read_exact(&mut body_bytes).await.unwrap();
        let body: Value = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

        let _ = tx.send(CapturedRequest {
            method,
            path,
            headers,
            body,
        });

        let http_resp = format!(
            "HTTP/1.1 {status} OK\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            resp_body.len(),
            resp_body,
        );
        let _ = write_half.write_all(http_resp.as_bytes()).await;
    });

    (port, rx)
}

/// Build an SSE body from a list of `data:` payloads.  `[DONE]` is appended
/// when `with_done` is set (OpenAI-style streams end with the sentinel;
/// Anthropic and Gemini end on their own events).
fn sse_body(payloads: &[Value], with_done: bool) -> String {
    let mut body = String::new();
    for p in payloads {
        body.push_str(&format!("data: {p}\n\n"));
    }
    if with_done {
        body.push_str("data: [DONE]\n\n");
    }
    body
}

fn cfg(model: &str, port: u16) -> ClientConfig {
    ClientConfig {
        model: model.into(),
        api_key: Some("test-key".into()),
        base_url: Some(format!("http://127.0.0.1:{port}/v1")),
        ..ClientConfig::default()
    }
}

async fn collect_events(
    backend: &dyn parley_model::ChatBackend,
    req: CompletionRequest,
) -> Vec<ResponseEvent> {
    let mut stream = backend.complete(req).await.expect("complete must succeed");
    let mut events = Vec::new();
    while let Some(ev) = stream.next().await {
        events.push(ev.expect("stream event must be ok"));
    }
    events
}

fn basic_request(user_text: &str) -> CompletionRequest {
    CompletionRequest {
        system: "You answer in one word.".into(),
        messages: vec![Message::user(user_text)],
        stream: true,
        ..Default::default()
    }
}

// ── OpenAI Chat Completions ───────────────────────────────────────────────────

#[tokio::test]
async fn openai_sends_correct_request_body() {
    let sse = sse_body(&[json!({"choices":[{"delta":{"content":"Paris"}}]})], true);
    let (port, captured) = mock_server_once(200, "text/event-stream", sse).await;

    let backend = from_config(&cfg("gpt-4o", port)).unwrap();
    let _ = collect_events(backend.as_ref(), basic_request("Capital of France?")).await;

    let req = captured.await.unwrap();
    assert_eq!(req.method, "POST");
    assert_eq!(req.path, "/v1/chat/completions");
    assert_eq!(req.body["model"], "gpt-4o");
    assert_eq!(req.body["stream"], true);
    assert_eq!(req.body["stream_options"]["include_usage"], true);
    assert_eq!(req.body["messages"][0]["role"], "system");
    assert_eq!(req.body["messages"][1]["role"], "user");
    assert_eq!(req.body["messages"][1]["content"], "Capital of France?");
}

#[tokio::test]
async fn openai_sends_bearer_auth_header() {
    let sse = sse_body(&[], true);
    let (port, captured) = mock_server_once(200, "text/event-stream", sse).await;

    let backend = from_config(&cfg("gpt-4o", port)).unwrap();
    let _ = collect_events(backend.as_ref(), basic_request("hi")).await;

    let req = captured.await.unwrap();
    assert_eq!(
        req.headers.get("authorization").map(String::as_str),
        Some("Bearer test-key")
    );
}

#[tokio::test]
async fn self_hosted_sends_no_auth_header() {
    let sse = sse_body(&[], true);
    let (port, captured) = mock_server_once(200, "text/event-stream", sse).await;

    let config = ClientConfig {
        model: "llama3".into(),
        base_url: Some(format!("http://127.0.0.1:{port}/v1")),
        ..ClientConfig::default()
    };
    let backend = from_config(&config).unwrap();
    let _ = collect_events(backend.as_ref(), basic_request("hi")).await;

    let req = captured.await.unwrap();
    assert!(
        !req.headers.contains_key("authorization"),
        "self-hosted endpoint must not send credentials"
    );
    assert_eq!(req.path, "/v1/chat/completions");
}

#[tokio::test]
async fn openai_formats_tools_correctly() {
    let sse = sse_body(&[], true);
    let (port, captured) = mock_server_once(200, "text/event-stream", sse).await;

    let backend = from_config(&cfg("gpt-4o", port)).unwrap();
    let mut req = basic_request("add 2 and 3");
    req.tools = vec![ToolDef::new(
        "add",
        "adds two integers",
        json!({
            "type": "object",
            "properties": { "a": { "type": "integer" }, "b": { "type": "integer" } },
            "required": ["a", "b"]
        }),
    )];
    let _ = collect_events(backend.as_ref(), req).await;

    let captured = captured.await.unwrap();
    let tool = &captured.body["tools"][0];
    assert_eq!(tool["type"], "function");
    assert_eq!(tool["function"]["name"], "add");
    assert_eq!(tool["function"]["description"], "adds two integers");
    assert_eq!(tool["function"]["parameters"]["type"], "object");
}

#[tokio::test]
async fn openai_response_format_uses_json_schema() {
    let sse = sse_body(&[], true);
    let (port, captured) = mock_server_once(200, "text/event-stream", sse).await;

    let backend = from_config(&cfg("gpt-4o", port)).unwrap();
    let mut req = basic_request("give me json");
    req.response_format = Some(ResponseFormat {
        name: "Answer".into(),
        schema: json!({ "type": "object" }),
    });
    let _ = collect_events(backend.as_ref(), req).await;

    let captured = captured.await.unwrap();
    assert_eq!(captured.body["response_format"]["type"], "json_schema");
    assert_eq!(captured.body["response_format"]["json_schema"]["name"], "Answer");
}

#[tokio::test]
async fn openai_text_and_usage_events_collected() {
    let sse = sse_body(
        &[
            json!({"choices":[{"delta":{"content":"Par"}}]}),
            json!({"choices":[{"delta":{"content":"is"}}]}),
            json!({"usage":{"prompt_tokens":12,"completion_tokens":2,"total_tokens":14}}),
        ],
        true,
    );
    let (port, _captured) = mock_server_once(200, "text/event-stream", sse).await;

    let backend = from_config(&cfg("gpt-4o", port)).unwrap();
    let events = collect_events(backend.as_ref(), basic_request("Capital of France?")).await;

    let text: String = events
        .iter()
        .filter_map(|e| match e {
            ResponseEvent::TextDelta(t) => Some(t.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(text, "Paris");
    assert!(events.iter().any(|e| matches!(e, ResponseEvent::Usage(u) if u.total_tokens == 14)));
    assert!(matches!(events.last(), Some(ResponseEvent::Done)));
}

#[tokio::test]
async fn openai_tool_call_fragments_collected() {
    let sse = sse_body(
        &[
            json!({"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1","function":{"name":"add","arguments":""}}]}}]}),
            json!({"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"a\":2,"}}]}}]}),
            json!({"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"\"b\":3}"}}]}}]}),
        ],
        true,
    );
    let (port, _captured) = mock_server_once(200, "text/event-stream", sse).await;

    let backend = from_config(&cfg("gpt-4o", port)).unwrap();
    let events = collect_events(backend.as_ref(), basic_request("what is 2+3?")).await;

    let fragments: Vec<&ResponseEvent> = events
        .iter()
        .filter(|e| matches!(e, ResponseEvent::ToolCallDelta { .. }))
        .collect();
    assert_eq!(fragments.len(), 3);
    let assembled: String = fragments
        .iter()
        .map(|e| match e {
            ResponseEvent::ToolCallDelta { arguments, .. } => arguments.as_str(),
            _ => unreachable!(),
        })
        .collect();
    assert_eq!(assembled, r#"{"a":2,"b":3}"#);
}

#[tokio::test]
async fn openai_non_200_response_returns_transport_error() {
    let (port, _captured) =
        mock_server_once(429, "application/json", r#"{"error":"rate limited"}"#).await;

    let backend = from_config(&cfg("gpt-4o", port)).unwrap();
    let err = backend
        .complete(basic_request("hi"))
        .await
        .expect_err("429 must fail");
    match err {
        Error::Transport(msg) => assert!(msg.contains("429"), "message should carry status: {msg}"),
        other => panic!("expected Transport, got {other:?}"),
    }
}

// ── OpenAI Responses ──────────────────────────────────────────────────────────

#[tokio::test]
async fn responses_sends_flat_item_input_and_instructions() {
    let sse = sse_body(&[json!({"type":"response.completed","response":{}})], false);
    let (port, captured) = mock_server_once(200, "text/event-stream", sse).await;

    let backend = from_config(&cfg("gpt-5-preview", port)).unwrap();
    let mut req = basic_request("hello");
    req.tools = vec![ToolDef::new("add", "adds", json!({"type":"object"}))];
    let _ = collect_events(backend.as_ref(), req).await;

    let captured = captured.await.unwrap();
    assert_eq!(captured.path, "/v1/responses");
    assert_eq!(captured.body["instructions"], "You answer in one word.");
    assert_eq!(captured.body["input"][0]["role"], "user");
    assert_eq!(captured.body["input"][0]["content"][0]["type"], "input_text");
    // Responses tools are flat: name at top level, no nested "function".
    assert_eq!(captured.body["tools"][0]["name"], "add");
    assert!(captured.body["tools"][0].get("function").is_none());
    assert!(captured.body.get("max_output_tokens").is_some());
}

#[tokio::test]
async fn responses_reasoning_model_omits_temperature() {
    let sse = sse_body(&[json!({"type":"response.completed","response":{}})], false);
    let (port, captured) = mock_server_once(200, "text/event-stream", sse).await;

    let mut config = cfg("o3-mini", port);
    config.temperature = Some(0.7);
    let backend = from_config(&config).unwrap();
    let _ = collect_events(backend.as_ref(), basic_request("hi")).await;

    let captured = captured.await.unwrap();
    assert!(
        captured.body.get("temperature").is_none(),
        "o-series models reject the temperature parameter"
    );
}

#[tokio::test]
async fn responses_stream_events_parsed_end_to_end() {
    let sse = sse_body(
        &[
            json!({"type":"response.output_item.added","output_index":0,
                   "item":{"type":"function_call","call_id":"fc_1","name":"add","arguments":""}}),
            json!({"type":"response.function_call_arguments.delta","output_index":0,"delta":"{\"a\":2,\"b\":3}"}),
            json!({"type":"response.output_text.delta","delta":"5"}),
            json!({"type":"response.completed","response":{"usage":{"input_tokens":9,"output_tokens":1,"total_tokens":10}}}),
        ],
        false,
    );
    let (port, _captured) = mock_server_once(200, "text/event-stream", sse).await;

    let backend = from_config(&cfg("gpt-5-preview", port)).unwrap();
    let events = collect_events(backend.as_ref(), basic_request("2+3?")).await;

    assert!(events.iter().any(
        |e| matches!(e, ResponseEvent::ToolCallDelta { id, name, .. } if id == "fc_1" && name == "add")
    ));
    assert!(events.iter().any(
        |e| matches!(e, ResponseEvent::ToolCallDelta { arguments, .. } if arguments == r#"{"a":2,"b":3}"#)
    ));
    assert!(events.iter().any(|e| matches!(e, ResponseEvent::TextDelta(t) if t == "5")));
    assert!(events.iter().any(|e| matches!(e, ResponseEvent::Usage(u) if u.total_tokens == 10)));
    assert!(matches!(events.last(), Some(ResponseEvent::Done)));
}

#[tokio::test]
async fn responses_function_call_output_items_built_from_tool_results() {
    let sse = sse_body(&[json!({"type":"response.completed","response":{}})], false);
    let (port, captured) = mock_server_once(200, "text/event-stream", sse).await;

    let backend = from_config(&cfg("gpt-5-preview", port)).unwrap();
    let mut req = basic_request("2+3?");
    req.messages = vec![
        Message::user("2+3?"),
        Message {
            role: Role::Assistant,
            contents: vec![ContentPart::tool_call("fc_1", "add", r#"{"a":2,"b":3}"#)],
            timestamp: None,
        },
        Message::tool_results(vec![ContentPart::tool_result("fc_1", "add", r#"{"sum":5}"#)]),
    ];
    let _ = collect_events(backend.as_ref(), req).await;

    let captured = captured.await.unwrap();
    let input = captured.body["input"].as_array().unwrap();
    assert_eq!(input[1]["type"], "function_call");
    assert_eq!(input[1]["call_id"], "fc_1");
    assert_eq!(input[2]["type"], "function_call_output");
    assert_eq!(input[2]["call_id"], "fc_1");
}

// ── Anthropic ─────────────────────────────────────────────────────────────────

fn anthropic_cfg(port: u16) -> ClientConfig {
    ClientConfig {
        model: "claude-3-opus".into(),
        api_key: Some("test-key".into()),
        base_url: Some(format!("http://127.0.0.1:{port}")),
        ..ClientConfig::default()
    }
}

#[tokio::test]
async fn anthropic_sends_correct_request_format() {
    let sse = sse_body(&[json!({"type":"message_stop"})], false);
    let (port, captured) = mock_server_once(200, "text/event-stream", sse).await;

    let backend = from_config(&anthropic_cfg(port)).unwrap();
    let _ = collect_events(backend.as_ref(), basic_request("hi")).await;

    let req = captured.await.unwrap();
    assert_eq!(req.path, "/v1/messages");
    assert_eq!(req.headers.get("x-api-key").map(String::as_str), Some("test-key"));
    assert_eq!(
        req.headers.get("anthropic-version").map(String::as_str),
        Some("2023-06-01")
    );
    // System prompt is out-of-band, not a conversation turn.
    assert_eq!(req.body["system"], "You answer in one word.");
    assert_eq!(req.body["messages"][0]["role"], "user");
    assert!(req.body.get("max_tokens").is_some());
}

#[tokio::test]
async fn anthropic_tools_use_input_schema_not_parameters() {
    let sse = sse_body(&[json!({"type":"message_stop"})], false);
    let (port, captured) = mock_server_once(200, "text/event-stream", sse).await;

    let backend = from_config(&anthropic_cfg(port)).unwrap();
    let mut req = basic_request("add");
    req.tools = vec![ToolDef::new("add", "adds", json!({"type":"object"}))];
    let _ = collect_events(backend.as_ref(), req).await;

    let captured = captured.await.unwrap();
    let tool = &captured.body["tools"][0];
    assert_eq!(tool["name"], "add");
    assert!(tool.get("input_schema").is_some());
    assert!(tool.get("parameters").is_none());
}

#[tokio::test]
async fn anthropic_response_format_becomes_system_directive() {
    let sse = sse_body(&[json!({"type":"message_stop"})], false);
    let (port, captured) = mock_server_once(200, "text/event-stream", sse).await;

    let backend = from_config(&anthropic_cfg(port)).unwrap();
    let mut req = basic_request("give me json");
    req.response_format = Some(ResponseFormat {
        name: "Answer".into(),
        schema: json!({ "type": "object" }),
    });
    let _ = collect_events(backend.as_ref(), req).await;

    let captured = captured.await.unwrap();
    let system = captured.body["system"].as_str().unwrap();
    assert!(system.starts_with("You answer in one word."));
    assert!(system.contains("\"Answer\""), "directive must name the schema: {system}");
}

#[tokio::test]
async fn anthropic_stream_events_parsed_end_to_end() {
    let sse = sse_body(
        &[
            json!({"type":"message_start","message":{"usage":{"input_tokens":12}}}),
            json!({"type":"content_block_start","index":0,
                   "content_block":{"type":"tool_use","id":"toolu_1","name":"add"}}),
            json!({"type":"content_block_delta","index":0,
                   "delta":{"type":"input_json_delta","partial_json":"{\"a\":2,"}}),
            json!({"type":"content_block_delta","index":0,
                   "delta":{"type":"input_json_delta","partial_json":"\"b\":3}"}}),
            json!({"type":"message_delta","usage":{"output_tokens":7}}),
            json!({"type":"message_stop"}),
        ],
        false,
    );
    let (port, _captured) = mock_server_once(200, "text/event-stream", sse).await;

    let backend = from_config(&anthropic_cfg(port)).unwrap();
    let events = collect_events(backend.as_ref(), basic_request("2+3?")).await;

    // Input and output usage arrive as separate observations.
    let usage_events: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, ResponseEvent::Usage(_)))
        .collect();
    assert_eq!(usage_events.len(), 2);

    let fragments: String = events
        .iter()
        .filter_map(|e| match e {
            ResponseEvent::ToolCallDelta { arguments, .. } => Some(arguments.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(fragments, r#"{"a":2,"b":3}"#);
    assert!(matches!(events.last(), Some(ResponseEvent::Done)));
}

// ── Gemini ────────────────────────────────────────────────────────────────────

fn gemini_cfg(port: u16) -> ClientConfig {
    ClientConfig {
        model: "gemini-1.5-pro".into(),
        api_key: Some("test-key".into()),
        base_url: Some(format!("http://127.0.0.1:{port}")),
        ..ClientConfig::default()
    }
}

#[tokio::test]
async fn gemini_url_targets_model_stream_endpoint() {
    let sse = sse_body(&[json!({"candidates":[{"content":{"parts":[{"text":"ok"}]},"finishReason":"STOP"}]})], false);
    let (port, captured) = mock_server_once(200, "text/event-stream", sse).await;

    let backend = from_config(&gemini_cfg(port)).unwrap();
    let _ = collect_events(backend.as_ref(), basic_request("hi")).await;

    let req = captured.await.unwrap();
    assert!(
        req.path
            .starts_with("/v1beta/models/gemini-1.5-pro:streamGenerateContent"),
        "unexpected path: {}",
        req.path
    );
    assert!(req.path.contains("alt=sse"));
    assert!(req.path.contains("key=test-key"));
}

#[tokio::test]
async fn gemini_system_prompt_folded_into_first_user_turn() {
    let sse = sse_body(&[json!({"candidates":[{"content":{"parts":[]},"finishReason":"STOP"}]})], false);
    let (port, captured) = mock_server_once(200, "text/event-stream", sse).await;

    let backend = from_config(&gemini_cfg(port)).unwrap();
    let _ = collect_events(backend.as_ref(), basic_request("Capital of France?")).await;

    let req = captured.await.unwrap();
    let contents = req.body["contents"].as_array().unwrap();
    assert_eq!(contents.len(), 1, "no separate system turn: {contents:?}");
    assert_eq!(contents[0]["role"], "user");
    assert_eq!(contents[0]["parts"][0]["text"], "You answer in one word.");
    assert_eq!(contents[0]["parts"][1]["text"], "Capital of France?");
}

#[tokio::test]
async fn gemini_tool_results_sent_as_function_response_parts() {
    let sse = sse_body(&[json!({"candidates":[{"content":{"parts":[]},"finishReason":"STOP"}]})], false);
    let (port, captured) = mock_server_once(200, "text/event-stream", sse).await;

    let backend = from_config(&gemini_cfg(port)).unwrap();
    let mut req = basic_request("2+3?");
    req.messages = vec![
        Message::user("2+3?"),
        Message {
            role: Role::Assistant,
            contents: vec![ContentPart::tool_call("call_0_add", "add", r#"{"a":2,"b":3}"#)],
            timestamp: None,
        },
        Message::tool_results(vec![ContentPart::tool_result("call_0_add", "add", r#"{"sum":5}"#)]),
    ];
    let _ = collect_events(backend.as_ref(), req).await;

    let captured = captured.await.unwrap();
    let contents = captured.body["contents"].as_array().unwrap();
    assert_eq!(contents[1]["role"], "model");
    assert_eq!(contents[1]["parts"][0]["functionCall"]["name"], "add");
    assert_eq!(
        contents[1]["parts"][0]["functionCall"]["args"],
        json!({"a":2,"b":3})
    );
    // Tool results ride in a user turn, matched by function name.
    assert_eq!(contents[2]["role"], "user");
    assert_eq!(contents[2]["parts"][0]["functionResponse"]["name"], "add");
}

#[tokio::test]
async fn gemini_stream_function_call_and_usage_parsed() {
    let sse = sse_body(
        &[
            json!({"candidates":[{"content":{"parts":[{"functionCall":{"name":"add","args":{"a":2,"b":3}}}]}}],
                   "usageMetadata":{"promptTokenCount":10,"candidatesTokenCount":5,"totalTokenCount":15}}),
            json!({"candidates":[{"content":{"parts":[]},"finishReason":"STOP"}]}),
        ],
        false,
    );
    let (port, _captured) = mock_server_once(200, "text/event-stream", sse).await;

    let backend = from_config(&gemini_cfg(port)).unwrap();
    let events = collect_events(backend.as_ref(), basic_request("2+3?")).await;

    assert!(events.iter().any(|e| matches!(e,
        ResponseEvent::ToolCallDelta { id, name, arguments, .. }
            if !id.is_empty() && name == "add" && arguments.contains("\"a\":2"))));
    assert!(events.iter().any(|e| matches!(e, ResponseEvent::Usage(u) if u.total_tokens == 15)));
    assert!(matches!(events.last(), Some(ResponseEvent::Done)));
}

#[tokio::test]
async fn gemini_response_format_sets_response_schema() {
    let sse = sse_body(&[json!({"candidates":[{"content":{"parts":[]},"finishReason":"STOP"}]})], false);
    let (port, captured) = mock_server_once(200, "text/event-stream", sse).await;

    let backend = from_config(&gemini_cfg(port)).unwrap();
    let mut req = basic_request("json please");
    req.response_format = Some(ResponseFormat {
        name: "Answer".into(),
        schema: json!({ "type": "object" }),
    });
    let _ = collect_events(backend.as_ref(), req).await;

    let captured = captured.await.unwrap();
    let gc = &captured.body["generationConfig"];
    assert_eq!(gc["responseMimeType"], "application/json");
    assert_eq!(gc["responseSchema"]["type"], "object");
}
