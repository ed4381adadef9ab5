//! Shared test fixtures: a scripted model backend standing in for a live
//! server.
#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use ye_agent::{ChatModel, Error, LlmResponse, Message, Result, ToolCall, ToolSpec, Usage};

/// One scripted model turn.
pub enum Step {
    /// A terminal text answer.
    Text(String),
    /// An assistant turn requesting tool calls.
    Calls(Vec<(String, String, Value)>),
    /// A transport fault.
    Fail(String),
}

/// Replays a fixed script of turns and records what it was asked.
pub struct ScriptedModel {
    script: Mutex<VecDeque<Step>>,
    pub calls: AtomicUsize,
    pub last_request: Mutex<Vec<Message>>,
    pub usage_per_turn: Option<u64>,
}

impl ScriptedModel {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            script: Mutex::new(steps.into()),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(Vec::new()),
            usage_per_turn: None,
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn generate(&self, messages: &[Message], _tools: &[ToolSpec]) -> Result<LlmResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = messages.to_vec();

        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Step::Text("(script exhausted)".into()));

        let usage = self.usage_per_turn.map(|total_tokens| Usage { total_tokens });
        match step {
            Step::Text(text) => Ok(LlmResponse {
                usage,
                ..LlmResponse::text(text)
            }),
            Step::Calls(calls) => Ok(LlmResponse {
                content: String::new(),
                thinking: None,
                tool_calls: Some(
                    calls
                        .into_iter()
                        .map(|(id, name, arguments)| ToolCall::function(id, name, arguments))
                        .collect(),
                ),
                finish_reason: "tool_calls".into(),
                usage,
            }),
            Step::Fail(message) => Err(Error::api(message)),
        }
    }
}
