//! Core type definitions for the agent runtime.
//!
//! This module contains the internal message model shared by every other
//! component. The type system is organized into three main categories:
//!
//! # Message System
//!
//! - [`Message`]: Container for conversation messages with role and content
//! - [`MessageRole`]: Enum defining who sent the message (System, User, Assistant, Tool)
//! - [`Content`]: Either a plain string or an ordered list of typed blocks
//! - [`ContentBlock`]: Typed content (text, image ref, resource ref, thinking,
//!   tool use, tool result)
//!
//! # Tool Calling
//!
//! - [`ToolCall`] / [`FunctionCall`]: A model request to execute a tool.
//!   Arguments are **structured** (`serde_json::Value`) everywhere inside the
//!   runtime; the JSON-string encoding some wire dialects use exists only
//!   inside the client's converters.
//! - [`ToolResult`]: Outcome of a tool execution
//! - [`ToolSpec`]: The canonical `{name, description, input_schema}` shape
//!   sent to model backends
//!
//! # Model Responses
//!
//! - [`LlmResponse`]: The dialect-independent response shape, including
//!   optional hidden reasoning (`thinking`) and token usage
//!
//! # Architecture Overview
//!
//! The internal representation is deliberately richer than either wire
//! dialect: block-style backends preserve `thinking`, chat-completions
//! backends do not, and both are projections of [`Message`]. Dialect code
//! lives only inside the client; nothing in conversation history ever holds
//! a dialect-specific shape.

use serde::{Deserialize, Serialize};

// ============================================================================
// MESSAGE MODEL
// ============================================================================

/// Identifies the sender/role of a message in the conversation.
///
/// Serializes to lowercase strings via serde (`"system"`, `"user"`, etc.)
/// to match the common chat-completion role system.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System message that establishes agent behavior and context.
    System,

    /// User message representing human or application input.
    User,

    /// Assistant message containing the model's response. Can include text,
    /// thinking and tool-call requests.
    Assistant,

    /// Tool result message containing the output of one tool execution,
    /// correlated back via `tool_call_id`.
    Tool,
}

/// Message content: a plain string or an ordered sequence of typed blocks.
///
/// Most messages carry plain text. Block lists appear when content is
/// multi-modal (image or resource references) or when a dialect round-trip
/// must preserve structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    /// Plain text content.
    Text(String),

    /// Ordered list of typed content blocks.
    Blocks(Vec<ContentBlock>),
}

impl Content {
    /// Flatten the content to plain text.
    ///
    /// Block lists are rendered block-by-block: text blocks verbatim, other
    /// blocks as bracketed placeholders. Used for token estimation, logging
    /// and summarisation.
    pub fn as_text(&self) -> String {
        match self {
            Content::Text(s) => s.clone(),
            Content::Blocks(blocks) => blocks
                .iter()
                .map(|b| match b {
                    ContentBlock::Text { text } => text.clone(),
                    ContentBlock::ImageRef { url } => format!("[Image: {url}]"),
                    ContentBlock::ResourceRef { uri } => format!("[Resource: {uri}]"),
                    ContentBlock::Thinking { thinking } => thinking.clone(),
                    ContentBlock::ToolUse { name, .. } => format!("[Tool use: {name}]"),
                    ContentBlock::ToolResult { tool_use_id, .. } => {
                        format!("[Tool result: {tool_use_id}]")
                    }
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Whether the content is empty (empty string or empty block list).
    pub fn is_empty(&self) -> bool {
        match self {
            Content::Text(s) => s.is_empty(),
            Content::Blocks(blocks) => blocks.is_empty(),
        }
    }
}

impl From<String> for Content {
    fn from(s: String) -> Self {
        Content::Text(s)
    }
}

impl From<&str> for Content {
    fn from(s: &str) -> Self {
        Content::Text(s.to_string())
    }
}

/// Typed content blocks that can appear inside a [`Content::Blocks`] list.
///
/// Uses serde's internally tagged format with a `"type"` field:
/// ```json
/// {"type": "text", "text": "Hello"}
/// {"type": "tool_use", "id": "t1", "name": "calc", "input": {"expr": "2+2"}}
/// {"type": "tool_result", "tool_use_id": "t1", "content": "4"}
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text.
    Text { text: String },

    /// Reference to an image by URL; payloads are never inlined.
    #[serde(rename = "image")]
    ImageRef { url: String },

    /// Reference to an external resource by URI.
    #[serde(rename = "resource")]
    ResourceRef { uri: String },

    /// Hidden model reasoning, preserved only by block-style backends.
    Thinking { thinking: String },

    /// A model request to execute a tool.
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },

    /// The result of a tool execution, keyed back to its request.
    ToolResult {
        tool_use_id: String,
        content: String,
    },
}

/// One conversation message.
///
/// Invariants maintained by the runtime (see the context manager and agent
/// loop):
/// - a `Tool`-role message always carries `tool_call_id` and `name`, and is
///   preceded by an `Assistant` message whose `tool_calls` contains that id;
/// - history starts with exactly one `System` message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Who sent this message.
    pub role: MessageRole,

    /// Message body.
    pub content: Content,

    /// Hidden reasoning attached to an assistant turn, when the backend
    /// returned one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,

    /// Tool calls requested by an assistant turn.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,

    /// For `Tool`-role messages: the id of the call this result answers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// For `Tool`-role messages: the tool's name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    /// Create a system message.
    pub fn system(content: impl Into<Content>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
            thinking: None,
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<Content>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            thinking: None,
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }

    /// Create an assistant message from a model response, carrying over
    /// content, thinking and tool calls.
    pub fn assistant_from(response: &LlmResponse) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: Content::Text(response.content.clone()),
            thinking: response.thinking.clone(),
            tool_calls: response.tool_calls.clone(),
            tool_call_id: None,
            name: None,
        }
    }

    /// Create a plain assistant message (used by tests and summaries).
    pub fn assistant(content: impl Into<Content>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            thinking: None,
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }

    /// Create a tool-result message answering `tool_call_id`.
    pub fn tool(
        content: impl Into<Content>,
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            role: MessageRole::Tool,
            content: content.into(),
            thinking: None,
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
            name: Some(name.into()),
        }
    }
}

// ============================================================================
// TOOL CALLING
// ============================================================================

/// A model request to invoke a function-shaped tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this call, used to correlate the result.
    pub id: String,

    /// Call kind; always `"function"` on the wire.
    #[serde(rename = "type")]
    pub kind: String,

    /// The function being called.
    pub function: FunctionCall,
}

impl ToolCall {
    /// Create a function call with structured arguments.
    pub fn function(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            kind: "function".to_string(),
            function: FunctionCall {
                name: name.into(),
                arguments,
            },
        }
    }
}

/// The function half of a [`ToolCall`]: a name plus structured arguments.
///
/// Arguments are always a structured `serde_json::Value` inside the runtime.
/// When a chat-completions backend delivers arguments as an unparseable JSON
/// string, the raw text is preserved verbatim under the reserved key
/// [`RAW_ARGUMENTS_KEY`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: serde_json::Value,
}

/// Reserved key under which unparseable wire arguments are preserved.
pub const RAW_ARGUMENTS_KEY: &str = "_raw";

/// Outcome of one tool execution.
///
/// An unsuccessful result always has empty `content` and a non-empty
/// `error`; the agent loop renders it as `"Error: " + error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    /// Create a successful result.
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            success: true,
            content: content.into(),
            error: None,
        }
    }

    /// Create a failed result. Content is forced empty.
    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            content: String::new(),
            error: Some(error.into()),
        }
    }
}

/// Canonical tool schema sent to model backends.
///
/// Block-style dialects consume this shape verbatim; the chat-completions
/// converter wraps it as `{type:"function", function:{name, description,
/// parameters}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

// ============================================================================
// MODEL RESPONSES
// ============================================================================

/// Token usage reported by a backend, when available.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Usage {
    pub total_tokens: u64,
}

/// Dialect-independent model response.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// Text content of the assistant turn (may be empty when the model only
    /// requests tools).
    pub content: String,

    /// Hidden reasoning; present only for block-style backends.
    pub thinking: Option<String>,

    /// Tool calls requested by this turn, in model order.
    pub tool_calls: Option<Vec<ToolCall>>,

    /// Why generation stopped (`"stop"`, `"tool_calls"`, `"end_turn"`, ...).
    pub finish_reason: String,

    /// Token usage, when the provider reports it.
    pub usage: Option<Usage>,
}

impl LlmResponse {
    /// A plain text response with no tool calls (handy in tests and demos).
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            thinking: None,
            tool_calls: None,
            finish_reason: "stop".to_string(),
            usage: None,
        }
    }

    /// Whether this response is a terminal answer (no tool calls).
    pub fn is_terminal(&self) -> bool {
        self.tool_calls.as_ref().is_none_or(|t| t.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_role_serialization() {
        assert_eq!(
            serde_json::to_string(&MessageRole::Assistant).unwrap(),
            "\"assistant\""
        );
        let role: MessageRole = serde_json::from_str("\"tool\"").unwrap();
        assert_eq!(role, MessageRole::Tool);
    }

    #[test]
    fn test_content_as_text_plain() {
        let c = Content::Text("hello".into());
        assert_eq!(c.as_text(), "hello");
        assert!(!c.is_empty());
    }

    #[test]
    fn test_content_as_text_blocks() {
        let c = Content::Blocks(vec![
            ContentBlock::Text {
                text: "look at".into(),
            },
            ContentBlock::ImageRef {
                url: "https://example.com/cat.jpg".into(),
            },
            ContentBlock::ResourceRef {
                uri: "file:///tmp/notes.md".into(),
            },
        ]);
        let text = c.as_text();
        assert!(text.contains("look at"));
        assert!(text.contains("[Image: https://example.com/cat.jpg]"));
        assert!(text.contains("[Resource: file:///tmp/notes.md]"));
    }

    #[test]
    fn test_content_block_tagged_serialization() {
        let block = ContentBlock::ToolUse {
            id: "t1".into(),
            name: "calc".into(),
            input: json!({"expr": "2+2"}),
        };
        let v = serde_json::to_value(&block).unwrap();
        assert_eq!(v["type"], "tool_use");
        assert_eq!(v["name"], "calc");

        let back: ContentBlock = serde_json::from_value(v).unwrap();
        assert!(matches!(back, ContentBlock::ToolUse { .. }));
    }

    #[test]
    fn test_message_constructors() {
        let msg = Message::tool("4", "t1", "calc");
        assert_eq!(msg.role, MessageRole::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("t1"));
        assert_eq!(msg.name.as_deref(), Some("calc"));

        let sys = Message::system("be helpful");
        assert_eq!(sys.role, MessageRole::System);
        assert!(sys.tool_call_id.is_none());
    }

    #[test]
    fn test_assistant_from_response() {
        let response = LlmResponse {
            content: "working on it".into(),
            thinking: Some("hmm".into()),
            tool_calls: Some(vec![ToolCall::function("t1", "calc", json!({"expr": "1"}))]),
            finish_reason: "tool_calls".into(),
            usage: Some(Usage { total_tokens: 42 }),
        };
        let msg = Message::assistant_from(&response);
        assert_eq!(msg.role, MessageRole::Assistant);
        assert_eq!(msg.thinking.as_deref(), Some("hmm"));
        assert_eq!(msg.tool_calls.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn test_tool_result_invariant() {
        let ok = ToolResult::ok("4");
        assert!(ok.success);
        assert_eq!(ok.content, "4");
        assert!(ok.error.is_none());

        let fail = ToolResult::fail("boom");
        assert!(!fail.success);
        assert!(fail.content.is_empty());
        assert_eq!(fail.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_response_is_terminal() {
        assert!(LlmResponse::text("hi").is_terminal());

        let mut r = LlmResponse::text("hi");
        r.tool_calls = Some(vec![]);
        assert!(r.is_terminal());

        r.tool_calls = Some(vec![ToolCall::function("t1", "calc", json!({}))]);
        assert!(!r.is_terminal());
    }
}
