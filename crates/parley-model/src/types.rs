use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

// ─── Content part types ───────────────────────────────────────────────────────

/// A single content part in a message.
///
/// Every message is an ordered sequence of parts.  Most messages carry a
/// single `Text` part; assistant tool-call turns carry one `ToolCall` part per
/// requested invocation, and tool turns carry one `ToolResult` part per
/// completed invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        text: String,
    },
    /// Caller-provided context injected per request.  Rendered as text on the
    /// wire but kept distinct in the neutral model so it is never confused
    /// with what the user actually typed.
    SystemReminder {
        text: String,
    },
    ToolCall {
        /// Opaque identifier assigned by the provider (or synthesized).
        id: String,
        name: String,
        /// Raw JSON argument document, exactly as assembled from the stream.
        arguments: String,
    },
    ToolResult {
        tool_call_id: String,
        name: String,
        /// Output of a successful execution.  Empty when `error` is set.
        #[serde(default)]
        content: String,
        /// Failure message.  Empty when `content` is set.
        #[serde(default)]
        error: String,
        /// Optional human-oriented rendering (e.g. truncated output for UIs).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        display: Option<String>,
    },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn reminder(text: impl Into<String>) -> Self {
        Self::SystemReminder { text: text.into() }
    }

    pub fn tool_call(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self::ToolCall {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    pub fn tool_result(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::ToolResult {
            tool_call_id: tool_call_id.into(),
            name: name.into(),
            content: content.into(),
            error: String::new(),
            display: None,
        }
    }

    pub fn tool_error(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self::ToolResult {
            tool_call_id: tool_call_id.into(),
            name: name.into(),
            content: String::new(),
            error: error.into(),
            display: None,
        }
    }
}

// ─── Message types ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A single message in the conversation history.
///
/// The neutral model does not enforce provider role-alternation rules; each
/// adapter applies them at serialization time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub contents: Vec<ContentPart>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            contents: vec![ContentPart::text(text)],
            timestamp: None,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            contents: vec![ContentPart::text(text)],
            timestamp: None,
        }
    }

    /// A tool turn carrying one `ToolResult` part per completed call.
    pub fn tool_results(parts: Vec<ContentPart>) -> Self {
        debug_assert!(parts
            .iter()
            .all(|p| matches!(p, ContentPart::ToolResult { .. })));
        Self {
            role: Role::Tool,
            contents: parts,
            timestamp: None,
        }
    }

    /// A message with zero parts is invalid and rejected at the API boundary.
    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }

    /// Return the plain text of this message if it has exactly one text part.
    pub fn as_text(&self) -> Option<&str> {
        match self.contents.as_slice() {
            [ContentPart::Text { text }] => Some(text),
            _ => None,
        }
    }

    /// Concatenate text and system-reminder parts with newlines.
    ///
    /// This is the shape sent to providers that accept a single text field
    /// per message.  Tool parts are ignored here; adapters serialize them
    /// into their provider-native encodings.
    pub fn joined_text(&self) -> String {
        self.contents
            .iter()
            .filter_map(|p| match p {
                ContentPart::Text { text } | ContentPart::SystemReminder { text } => {
                    Some(text.as_str())
                }
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn has_tool_calls(&self) -> bool {
        self.contents
            .iter()
            .any(|p| matches!(p, ContentPart::ToolCall { .. }))
    }
}

// ─── Tool definitions ─────────────────────────────────────────────────────────

/// A tool schema offered to the model.
///
/// `input_schema` is the JSON-Schema document describing the argument object
/// (the `inputSchema` field of an MCP tool description).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDef {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

impl ToolDef {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

// ─── Usage accounting ─────────────────────────────────────────────────────────

/// Token usage reported by a provider for one observation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
    pub cached_tokens: u32,
}

impl TokenUsage {
    pub fn is_zero(&self) -> bool {
        self.total_tokens == 0
    }

    /// Field-wise accumulation into `self`.
    pub fn add(&mut self, other: &TokenUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.total_tokens += other.total_tokens;
        self.cached_tokens += other.cached_tokens;
    }
}

// ─── Requests and streamed events ─────────────────────────────────────────────

/// Structured-output request: a named JSON schema the reply must satisfy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponseFormat {
    pub name: String,
    pub schema: Value,
}

/// Request sent to a model back-end.
///
/// The system prompt is carried out-of-band from the message list; each
/// adapter is the only place that knows whether the provider wants it as a
/// leading message, a top-level field, or folded into the first user turn.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub system: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDef>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub response_format: Option<ResponseFormat>,
    pub stream: bool,
}

/// A single streamed event from a back-end, already demultiplexed from the
/// provider's wire framing.
#[derive(Debug, Clone)]
pub enum ResponseEvent {
    /// A text delta streamed from the model.
    TextDelta(String),
    /// A fragment of a tool call.  `index` keys the in-progress slot; `id`
    /// and `name` arrive on the first fragment for most providers while
    /// `arguments` accumulates across fragments.
    ToolCallDelta {
        index: u32,
        id: String,
        name: String,
        arguments: String,
    },
    /// A usage observation.  May occur more than once per stream.
    Usage(TokenUsage),
    /// The stream finished normally.
    Done,
}

// ─── Shared translation helpers ───────────────────────────────────────────────

/// Build the wire payload for a tool result part.
///
/// Content that is valid JSON is forwarded structurally; anything else is
/// wrapped as `{"result": <string>}`.  An empty successful result becomes
/// `{"result": "success"}` because several providers reject empty tool
/// responses.  Errors become `{"error": <message>}`.
pub fn tool_result_payload(content: &str, error: &str) -> Value {
    if !error.is_empty() {
        return json!({ "error": error });
    }
    if content.is_empty() {
        return json!({ "result": "success" });
    }
    match serde_json::from_str::<Value>(content) {
        Ok(v) if v.is_object() || v.is_array() => v,
        _ => json!({ "result": content }),
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
