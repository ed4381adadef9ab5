//! Model client with two interchangeable wire dialects
//!
//! The runtime speaks one internal message shape (see [`crate::types`]) and
//! normalises two wire dialects into it:
//!
//! - **Block-style** (`POST {api_base}/v1/messages`): the system message is
//!   carried out-of-band, assistant turns that mix thinking, text and tool
//!   calls are serialised as ordered typed block lists, and tool results are
//!   posted back as user-role messages containing a `tool_result` block.
//! - **Chat-completions** (`POST {api_base}/chat/completions`): one flat
//!   message list, assistant `tool_calls` in a structured field with
//!   JSON-string encoded arguments, tool results as `tool`-role messages.
//!
//! Conversions are lossless for the fields the runtime uses; `thinking`
//! survives only in block-style and degrades to absent in chat-completions.
//! Dialect-specific shapes never leak out of this module.
//!
//! The client is stateless across calls; concurrency is the caller's
//! responsibility.

use crate::config::{Dialect, LlmConfig};
use crate::types::{
    Content, FunctionCall, LlmResponse, Message, MessageRole, ToolCall, ToolSpec, Usage,
    RAW_ARGUMENTS_KEY,
};
use crate::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

/// The seam between the runtime and a chat model backend.
///
/// [`LlmClient`] is the production implementation; tests and embedders can
/// supply scripted implementations.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Generate one assistant turn from the given history and tool set.
    async fn generate(&self, messages: &[Message], tools: &[ToolSpec]) -> Result<LlmResponse>;
}

/// Stateless request/reply bridge to a chat model backend.
pub struct LlmClient {
    config: LlmConfig,
    http: reqwest::Client,
}

impl LlmClient {
    /// Create a client from a validated configuration.
    pub fn new(config: LlmConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(Error::Http)?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    async fn post(&self, path: &str, payload: &Value) -> Result<(u16, String)> {
        let url = format!("{}{}", self.config.api_base(), path);
        let mut request = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key()))
            .header("Content-Type", "application/json");

        if self.config.dialect() == Dialect::Blocks {
            request = request.header("anthropic-version", "2023-06-01");
        }

        let response = request.json(payload).send().await.map_err(Error::Http)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(Error::Http)?;
        Ok((status, body))
    }

    async fn generate_blocks(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<LlmResponse> {
        let payload = build_blocks_payload(
            self.config.model(),
            self.config.max_tokens(),
            messages,
            tools,
        );

        let (status, body) = self.post("/v1/messages", &payload).await?;
        if !(200..300).contains(&status) {
            return Err(Error::api_code(status as i64, body, status_hint(status)));
        }

        let result: Value = serde_json::from_str(&body)?;
        parse_blocks_response(&result, self.config.model())
    }

    async fn generate_chat(&self, messages: &[Message], tools: &[ToolSpec]) -> Result<LlmResponse> {
        let payload = build_chat_payload(
            self.config.model(),
            self.config.max_tokens(),
            messages,
            tools,
        );

        let (status, body) = self.post("/chat/completions", &payload).await?;
        let result: Value = match serde_json::from_str(&body) {
            Ok(v) => v,
            Err(e) if (200..300).contains(&status) => return Err(Error::Json(e)),
            // Non-2xx with a non-JSON body: report the raw text
            Err(_) => return Err(Error::api_code(status as i64, body, status_hint(status))),
        };

        if status >= 400 {
            // Common error envelopes: {"error": {"message": ..}} or {"message": ..}
            let message = result
                .get("error")
                .and_then(|e| {
                    e.get("message")
                        .or_else(|| e.get("type"))
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .or_else(|| e.as_str().map(str::to_string))
                })
                .or_else(|| {
                    result
                        .get("message")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                })
                .unwrap_or(body);
            return Err(Error::api_code(status as i64, message, status_hint(status)));
        }

        parse_chat_response(&result)
    }
}

/// Actionable hints for the HTTP statuses a user can do something about.
/// Other statuses carry no hint; the code alone routes retryability.
fn status_hint(status: u16) -> Option<String> {
    match status {
        401 | 403 => Some("authentication failed, check your API key".to_string()),
        429 => Some("rate limited or quota exhausted, check your plan".to_string()),
        _ => None,
    }
}

#[async_trait]
impl ChatModel for LlmClient {
    async fn generate(&self, messages: &[Message], tools: &[ToolSpec]) -> Result<LlmResponse> {
        match self.config.dialect() {
            Dialect::Blocks => self.generate_blocks(messages, tools).await,
            Dialect::ChatCompletions => self.generate_chat(messages, tools).await,
        }
    }
}

// ============================================================================
// BLOCK-STYLE DIALECT
// ============================================================================

fn build_blocks_payload(
    model: &str,
    max_tokens: u32,
    messages: &[Message],
    tools: &[ToolSpec],
) -> Value {
    let mut system_message: Option<String> = None;
    let mut api_messages: Vec<Value> = Vec::new();

    for msg in messages {
        match msg.role {
            MessageRole::System => {
                // Carried out-of-band in the top-level "system" field
                system_message = Some(msg.content.as_text());
            }
            MessageRole::User => {
                api_messages.push(json!({
                    "role": "user",
                    "content": content_to_wire(&msg.content),
                }));
            }
            MessageRole::Assistant => {
                if msg.thinking.is_some() || msg.tool_calls.is_some() {
                    // Mixed turns become an ordered typed block list:
                    // thinking, then text, then tool_use blocks.
                    let mut blocks: Vec<Value> = Vec::new();
                    if let Some(thinking) = &msg.thinking {
                        blocks.push(json!({"type": "thinking", "thinking": thinking}));
                    }
                    let text = msg.content.as_text();
                    if !text.is_empty() {
                        blocks.push(json!({"type": "text", "text": text}));
                    }
                    if let Some(tool_calls) = &msg.tool_calls {
                        for tc in tool_calls {
                            blocks.push(json!({
                                "type": "tool_use",
                                "id": tc.id,
                                "name": tc.function.name,
                                "input": tc.function.arguments,
                            }));
                        }
                    }
                    api_messages.push(json!({"role": "assistant", "content": blocks}));
                } else {
                    api_messages.push(json!({
                        "role": "assistant",
                        "content": content_to_wire(&msg.content),
                    }));
                }
            }
            MessageRole::Tool => {
                // Tool results travel as user-role tool_result blocks
                api_messages.push(json!({
                    "role": "user",
                    "content": [{
                        "type": "tool_result",
                        "tool_use_id": msg.tool_call_id,
                        "content": msg.content.as_text(),
                    }],
                }));
            }
        }
    }

    let mut payload = json!({
        "model": model,
        "messages": api_messages,
        "max_tokens": max_tokens,
    });
    if let Some(system) = system_message {
        payload["system"] = Value::String(system);
    }
    if !tools.is_empty() {
        // Block-style consumes the canonical spec shape verbatim
        payload["tools"] = serde_json::to_value(tools).unwrap_or(Value::Null);
    }
    payload
}

/// Project internal content onto the block-style wire: plain strings stay
/// strings, block lists are serialised as typed blocks.
fn content_to_wire(content: &Content) -> Value {
    match content {
        Content::Text(s) => Value::String(s.clone()),
        Content::Blocks(_) => serde_json::to_value(content).unwrap_or(Value::Null),
    }
}

/// Provider envelope carried by some block-style backends.
#[derive(Debug, Deserialize)]
struct BaseResp {
    status_code: Option<i64>,
    status_msg: Option<String>,
}

fn parse_blocks_response(result: &Value, model: &str) -> Result<LlmResponse> {
    // Typed error envelope
    if result.get("type").and_then(Value::as_str) == Some("error") {
        let error_info = result.get("error").cloned().unwrap_or_default();
        return Err(Error::api(format!(
            "API Error ({}): {}",
            error_info.get("type").and_then(Value::as_str).unwrap_or("unknown"),
            error_info
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("no message"),
        )));
    }

    // Provider status envelope: codes 0, 1000 and absence denote success
    if let Some(base_resp) = result.get("base_resp") {
        let base: BaseResp = serde_json::from_value(base_resp.clone())?;
        if let Some(code) = base.status_code {
            if code != 0 && code != 1000 {
                let hint = match code {
                    1008 => Some("insufficient account balance, please recharge".to_string()),
                    2013 => Some(format!("model '{model}' is not supported")),
                    _ => None,
                };
                return Err(Error::api_code(
                    code,
                    base.status_msg.unwrap_or_else(|| "unknown error".to_string()),
                    hint,
                ));
            }
        }
    }

    let empty = Vec::new();
    let content_blocks = result
        .get("content")
        .and_then(Value::as_array)
        .unwrap_or(&empty);
    let stop_reason = result
        .get("stop_reason")
        .and_then(Value::as_str)
        .unwrap_or("stop")
        .to_string();

    let mut text_content = String::new();
    let mut thinking_content = String::new();
    let mut tool_calls: Vec<ToolCall> = Vec::new();

    for block in content_blocks {
        match block.get("type").and_then(Value::as_str) {
            Some("text") => {
                text_content.push_str(block.get("text").and_then(Value::as_str).unwrap_or(""));
            }
            Some("thinking") => {
                thinking_content
                    .push_str(block.get("thinking").and_then(Value::as_str).unwrap_or(""));
            }
            Some("tool_use") => {
                tool_calls.push(ToolCall {
                    id: block
                        .get("id")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    kind: "function".to_string(),
                    function: FunctionCall {
                        name: block
                            .get("name")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                        arguments: block.get("input").cloned().unwrap_or_else(|| json!({})),
                    },
                });
            }
            _ => {}
        }
    }

    Ok(LlmResponse {
        content: text_content,
        thinking: (!thinking_content.is_empty()).then_some(thinking_content),
        tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
        finish_reason: stop_reason,
        usage: parse_usage(result.get("usage")),
    })
}

// ============================================================================
// CHAT-COMPLETIONS DIALECT
// ============================================================================

fn build_chat_payload(
    model: &str,
    max_tokens: u32,
    messages: &[Message],
    tools: &[ToolSpec],
) -> Value {
    let mut oa_messages: Vec<Value> = Vec::new();

    for msg in messages {
        match msg.role {
            MessageRole::System => {
                oa_messages.push(json!({"role": "system", "content": msg.content.as_text()}));
            }
            MessageRole::User => {
                oa_messages.push(json!({"role": "user", "content": msg.content.as_text()}));
            }
            MessageRole::Assistant => {
                // Chat-completions has no thinking channel; it degrades to absent.
                let mut entry = json!({
                    "role": "assistant",
                    "content": msg.content.as_text(),
                });
                if let Some(tool_calls) = &msg.tool_calls {
                    let wire_calls: Vec<Value> = tool_calls
                        .iter()
                        .map(|tc| {
                            json!({
                                "id": tc.id,
                                "type": tc.kind,
                                "function": {
                                    "name": tc.function.name,
                                    "arguments": arguments_to_wire(&tc.function.arguments),
                                },
                            })
                        })
                        .collect();
                    entry["tool_calls"] = Value::Array(wire_calls);
                }
                oa_messages.push(entry);
            }
            MessageRole::Tool => {
                let mut entry = json!({
                    "role": "tool",
                    "tool_call_id": msg.tool_call_id,
                    "content": msg.content.as_text(),
                });
                if let Some(name) = &msg.name {
                    entry["name"] = Value::String(name.clone());
                }
                oa_messages.push(entry);
            }
        }
    }

    let mut payload = json!({
        "model": model,
        "messages": oa_messages,
        "max_tokens": max_tokens,
    });
    if !tools.is_empty() {
        let wrapped: Vec<Value> = tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.input_schema,
                    },
                })
            })
            .collect();
        payload["tools"] = Value::Array(wrapped);
        payload["tool_choice"] = Value::String("auto".to_string());
    }
    payload
}

/// Encode structured arguments as the JSON string this dialect expects.
/// Arguments preserved verbatim under the reserved raw key round-trip back
/// to their original unparsed text.
fn arguments_to_wire(arguments: &Value) -> String {
    if let Value::Object(map) = arguments {
        if map.len() == 1 {
            if let Some(Value::String(raw)) = map.get(RAW_ARGUMENTS_KEY) {
                return raw.clone();
            }
        }
    }
    serde_json::to_string(arguments).unwrap_or_else(|_| "{}".to_string())
}

/// Decode a wire arguments string to a structured value. Invalid JSON is
/// preserved verbatim under the reserved raw key.
fn arguments_from_wire(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(v) => v,
        Err(_) => json!({ RAW_ARGUMENTS_KEY: raw }),
    }
}

fn parse_chat_response(result: &Value) -> Result<LlmResponse> {
    let choice = result
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|c| c.first())
        .ok_or_else(|| Error::api("response missing 'choices'"))?;

    let message = choice.get("message").cloned().unwrap_or_else(|| json!({}));
    let finish_reason = choice
        .get("finish_reason")
        .and_then(Value::as_str)
        .unwrap_or("stop")
        .to_string();

    let content = message
        .get("content")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();

    let mut tool_calls: Vec<ToolCall> = Vec::new();
    if let Some(raw_calls) = message.get("tool_calls").and_then(Value::as_array) {
        for tc in raw_calls {
            let function = tc.get("function").cloned().unwrap_or_else(|| json!({}));
            let arguments = match function.get("arguments") {
                Some(Value::String(s)) => arguments_from_wire(s),
                Some(v) => v.clone(),
                None => json!({}),
            };
            tool_calls.push(ToolCall {
                id: tc
                    .get("id")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                kind: tc
                    .get("type")
                    .and_then(Value::as_str)
                    .unwrap_or("function")
                    .to_string(),
                function: FunctionCall {
                    name: function
                        .get("name")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    arguments,
                },
            });
        }
    }

    Ok(LlmResponse {
        content,
        thinking: None,
        tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
        finish_reason,
        usage: parse_usage(result.get("usage")),
    })
}

/// Extract a total token count from a usage object. Backends that report
/// only `input_tokens`/`output_tokens` are summed.
fn parse_usage(usage: Option<&Value>) -> Option<Usage> {
    let usage = usage?;
    if let Some(total) = usage.get("total_tokens").and_then(Value::as_u64) {
        return Some(Usage {
            total_tokens: total,
        });
    }
    let input = usage.get("input_tokens").and_then(Value::as_u64);
    let output = usage.get("output_tokens").and_then(Value::as_u64);
    match (input, output) {
        (None, None) => None,
        (i, o) => Some(Usage {
            total_tokens: i.unwrap_or(0) + o.unwrap_or(0),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ToolResult;

    fn specs() -> Vec<ToolSpec> {
        vec![ToolSpec {
            name: "calc".into(),
            description: "Evaluate".into(),
            input_schema: json!({"type": "object", "properties": {"expr": {"type": "string"}}}),
        }]
    }

    #[test]
    fn test_blocks_payload_system_out_of_band() {
        let messages = vec![Message::system("be helpful"), Message::user("hi")];
        let payload = build_blocks_payload("m", 16384, &messages, &[]);

        assert_eq!(payload["system"], "be helpful");
        let wire = payload["messages"].as_array().unwrap();
        assert_eq!(wire.len(), 1);
        assert_eq!(wire[0]["role"], "user");
    }

    #[test]
    fn test_blocks_payload_mixed_assistant_turn() {
        let response = LlmResponse {
            content: "let me check".into(),
            thinking: Some("hmm".into()),
            tool_calls: Some(vec![ToolCall::function("t1", "calc", json!({"expr": "2+2"}))]),
            finish_reason: "tool_use".into(),
            usage: None,
        };
        let messages = vec![
            Message::system("s"),
            Message::user("what is 2+2?"),
            Message::assistant_from(&response),
            Message::tool("4", "t1", "calc"),
        ];
        let payload = build_blocks_payload("m", 16384, &messages, &specs());

        let wire = payload["messages"].as_array().unwrap();
        let blocks = wire[1]["content"].as_array().unwrap();
        assert_eq!(blocks[0]["type"], "thinking");
        assert_eq!(blocks[1]["type"], "text");
        assert_eq!(blocks[2]["type"], "tool_use");
        assert_eq!(blocks[2]["input"]["expr"], "2+2");

        // tool results become user-role tool_result blocks
        assert_eq!(wire[2]["role"], "user");
        assert_eq!(wire[2]["content"][0]["type"], "tool_result");
        assert_eq!(wire[2]["content"][0]["tool_use_id"], "t1");

        // block-style tools are the canonical spec shape
        assert_eq!(payload["tools"][0]["name"], "calc");
        assert!(payload["tools"][0]["input_schema"].is_object());
    }

    #[test]
    fn test_blocks_response_round_trip() {
        let wire = json!({
            "content": [
                {"type": "thinking", "thinking": "reasoning"},
                {"type": "text", "text": "checking"},
                {"type": "tool_use", "id": "t1", "name": "calc", "input": {"expr": "2+2"}},
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 10, "output_tokens": 5},
        });
        let response = parse_blocks_response(&wire, "m").unwrap();
        assert_eq!(response.content, "checking");
        assert_eq!(response.thinking.as_deref(), Some("reasoning"));
        assert_eq!(response.usage.unwrap().total_tokens, 15);

        // Back onto the wire: role/content/tool_calls survive unchanged
        let messages = vec![Message::system("s"), Message::assistant_from(&response)];
        let payload = build_blocks_payload("m", 16384, &messages, &[]);
        let blocks = payload["messages"][0]["content"].as_array().unwrap();
        assert_eq!(blocks[0]["thinking"], "reasoning");
        assert_eq!(blocks[1]["text"], "checking");
        assert_eq!(blocks[2]["id"], "t1");
        assert_eq!(blocks[2]["input"]["expr"], "2+2");
    }

    #[test]
    fn test_blocks_error_envelope() {
        let wire = json!({
            "type": "error",
            "error": {"type": "overloaded_error", "message": "try later"},
        });
        let err = parse_blocks_response(&wire, "m").unwrap_err();
        assert!(err.to_string().contains("overloaded_error"));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_blocks_base_resp_codes() {
        // success codes pass through
        for code in [0, 1000] {
            let wire = json!({
                "base_resp": {"status_code": code, "status_msg": "ok"},
                "content": [{"type": "text", "text": "hi"}],
                "stop_reason": "stop",
            });
            assert!(parse_blocks_response(&wire, "m").is_ok());
        }

        // balance code carries a hint
        let wire = json!({"base_resp": {"status_code": 1008, "status_msg": "no balance"}});
        match parse_blocks_response(&wire, "m").unwrap_err() {
            Error::Api { code, hint, .. } => {
                assert_eq!(code, Some(1008));
                assert!(hint.unwrap().contains("balance"));
            }
            other => panic!("expected Api error, got {other:?}"),
        }

        // unsupported-model code names the model
        let wire = json!({"base_resp": {"status_code": 2013, "status_msg": "bad model"}});
        match parse_blocks_response(&wire, "m2-large").unwrap_err() {
            Error::Api { hint, .. } => assert!(hint.unwrap().contains("m2-large")),
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn test_chat_payload_arguments_are_json_strings() {
        let messages = vec![
            Message::system("s"),
            Message::user("2+2?"),
            Message::assistant_from(&LlmResponse {
                content: String::new(),
                thinking: None,
                tool_calls: Some(vec![ToolCall::function("t1", "calc", json!({"expr": "2+2"}))]),
                finish_reason: "tool_calls".into(),
                usage: None,
            }),
            Message::tool("4", "t1", "calc"),
        ];
        let payload = build_chat_payload("m", 2048, &messages, &specs());

        let wire = payload["messages"].as_array().unwrap();
        let args = wire[2]["tool_calls"][0]["function"]["arguments"]
            .as_str()
            .unwrap();
        assert_eq!(
            serde_json::from_str::<Value>(args).unwrap(),
            json!({"expr": "2+2"})
        );

        assert_eq!(wire[3]["role"], "tool");
        assert_eq!(wire[3]["tool_call_id"], "t1");
        assert_eq!(wire[3]["name"], "calc");

        // chat-completions wraps tool specs
        assert_eq!(payload["tools"][0]["type"], "function");
        assert_eq!(payload["tools"][0]["function"]["name"], "calc");
        assert_eq!(payload["tool_choice"], "auto");
    }

    #[test]
    fn test_chat_response_parses_arguments() {
        let wire = json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "t1",
                        "type": "function",
                        "function": {"name": "calc", "arguments": "{\"expr\": \"2+2\"}"},
                    }],
                },
                "finish_reason": "tool_calls",
            }],
            "usage": {"total_tokens": 30},
        });
        let response = parse_chat_response(&wire).unwrap();
        let calls = response.tool_calls.unwrap();
        assert_eq!(calls[0].function.arguments, json!({"expr": "2+2"}));
        assert_eq!(response.usage.unwrap().total_tokens, 30);
        assert!(response.thinking.is_none());
    }

    #[test]
    fn test_chat_invalid_arguments_round_trip_verbatim() {
        let wire = json!({
            "choices": [{
                "message": {
                    "content": "",
                    "tool_calls": [{
                        "id": "t1",
                        "type": "function",
                        "function": {"name": "calc", "arguments": "{not json"},
                    }],
                },
                "finish_reason": "tool_calls",
            }],
        });
        let response = parse_chat_response(&wire).unwrap();
        let calls = response.tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.arguments[RAW_ARGUMENTS_KEY], "{not json");

        // back onto the wire: the raw text is emitted verbatim
        let messages = vec![Message::system("s"), Message::assistant_from(&response)];
        let payload = build_chat_payload("m", 2048, &messages, &[]);
        assert_eq!(
            payload["messages"][1]["tool_calls"][0]["function"]["arguments"],
            "{not json"
        );
    }

    #[test]
    fn test_chat_response_missing_choices() {
        let err = parse_chat_response(&json!({})).unwrap_err();
        assert!(err.to_string().contains("choices"));
    }

    #[test]
    fn test_parse_usage_variants() {
        assert!(parse_usage(None).is_none());
        assert!(parse_usage(Some(&json!({}))).is_none());
        assert_eq!(
            parse_usage(Some(&json!({"total_tokens": 7}))).unwrap().total_tokens,
            7
        );
        assert_eq!(
            parse_usage(Some(&json!({"input_tokens": 3, "output_tokens": 4})))
                .unwrap()
                .total_tokens,
            7
        );
    }

    #[test]
    fn test_http_status_classification_and_hints() {
        // auth failures are fatal for the turn and carry an actionable hint
        let err = Error::api_code(401, "Unauthorized", status_hint(401));
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("check your API key"));

        let err = Error::api_code(429, "Too Many Requests", status_hint(429));
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("quota"));

        // server faults carry no hint and stay retryable
        let err = Error::api_code(503, "Service Unavailable", status_hint(503));
        assert!(err.is_retryable());
        assert!(status_hint(503).is_none());
    }

    // Exercised indirectly through ToolResult to keep the invariant visible
    #[test]
    fn test_tool_result_error_shape() {
        let fail = ToolResult::fail("nope");
        assert_eq!(fail.content, "");
        assert!(fail.error.is_some());
    }
}
