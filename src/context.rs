//! Conversation context management
//!
//! [`ContextManager`] owns one conversation's message history and tool
//! list, accounts for token usage, and compacts history by summarisation
//! when a token limit is crossed.
//!
//! # Token accounting
//!
//! Two signals are tracked:
//!
//! - a local estimate from a `cl100k_base` BPE tokeniser applied to every
//!   textual field (content, thinking, stringified tool calls) plus a fixed
//!   per-message overhead of 4 tokens — with a `chars / 2.5` fallback when
//!   the tokeniser cannot be constructed;
//! - the last `total_tokens` the provider reported.
//!
//! Summarisation triggers when either signal exceeds `token_limit`. The
//! provider signal is only consulted while a report is actually present, so
//! backends that never return usage cannot double-fire the trigger.
//!
//! # Summarisation
//!
//! The pass keeps the system message and every original user turn, and
//! replaces each span of assistant/tool traffic between consecutive user
//! turns with a compact user-role summary prefixed `[Execution Summary]`.
//! The trailing span after the last user turn is summarised too, so no
//! dangling tool-use survives without its result. Summary text comes from a
//! one-shot model call; if that call fails, the rendered raw slice is used
//! instead (lossy but bounded by the original).

use crate::client::ChatModel;
use crate::types::{LlmResponse, Message, MessageRole, ToolResult, ToolSpec, Usage};
use crate::Result;
use std::sync::{Arc, OnceLock};
use tiktoken_rs::CoreBPE;

/// Marker prefixed to every synthetic summary message.
pub const SUMMARY_MARKER: &str = "[Execution Summary]";

/// Lazily constructed shared tokeniser. `None` when construction failed;
/// the estimate then falls back to a character ratio.
fn encoder() -> Option<&'static CoreBPE> {
    static ENCODER: OnceLock<Option<CoreBPE>> = OnceLock::new();
    ENCODER
        .get_or_init(|| tiktoken_rs::cl100k_base().ok())
        .as_ref()
}

/// Owns one conversation's message list and tool list.
pub struct ContextManager {
    messages: Vec<Message>,
    tools: Vec<ToolSpec>,
    model: Arc<dyn ChatModel>,
    token_limit: u64,
    api_total_tokens: Option<u64>,
    skip_next_check: bool,
}

impl ContextManager {
    /// Create a manager whose history starts with the given system prompt.
    pub fn new(
        system_prompt: impl Into<String>,
        model: Arc<dyn ChatModel>,
        tools: Vec<ToolSpec>,
        token_limit: u64,
    ) -> Self {
        Self {
            messages: vec![Message::system(system_prompt.into())],
            tools,
            model,
            token_limit,
            api_total_tokens: None,
            skip_next_check: false,
        }
    }

    /// Append a user message.
    pub fn append_user(&mut self, text: impl Into<String>) {
        self.messages.push(Message::user(text.into()));
    }

    /// Append an assistant message built from a model response.
    pub fn append_assistant(&mut self, response: &LlmResponse) {
        self.messages.push(Message::assistant_from(response));
    }

    /// Append a tool-result message. Failed results render as
    /// `"Error: " + error`.
    pub fn append_tool(
        &mut self,
        result: &ToolResult,
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
    ) {
        let content = if result.success {
            result.content.clone()
        } else {
            format!(
                "Error: {}",
                result.error.as_deref().unwrap_or("unknown error")
            )
        };
        self.messages.push(Message::tool(content, tool_call_id, name));
    }

    /// The payload for the next model call. Callers must not mutate.
    pub fn context(&self) -> (&[Message], &[ToolSpec]) {
        (&self.messages, &self.tools)
    }

    /// Record the provider-reported token total from a response.
    pub fn update_api_tokens(&mut self, usage: Option<Usage>) {
        if let Some(usage) = usage {
            self.api_total_tokens = Some(usage.total_tokens);
        }
    }

    /// A stable copy of the history for inspection.
    pub fn history_snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    /// Local token estimate for the current history.
    pub fn estimate_tokens(&self) -> u64 {
        match encoder() {
            Some(bpe) => {
                let mut total: u64 = 0;
                for msg in &self.messages {
                    total += bpe.encode_ordinary(&msg.content.as_text()).len() as u64;
                    if let Some(thinking) = &msg.thinking {
                        total += bpe.encode_ordinary(thinking).len() as u64;
                    }
                    if let Some(tool_calls) = &msg.tool_calls {
                        let rendered =
                            serde_json::to_string(tool_calls).unwrap_or_default();
                        total += bpe.encode_ordinary(&rendered).len() as u64;
                    }
                    // per-message metadata overhead
                    total += 4;
                }
                total
            }
            None => self.estimate_tokens_fallback(),
        }
    }

    /// Character-ratio fallback when no tokeniser is available.
    fn estimate_tokens_fallback(&self) -> u64 {
        let mut total_chars: usize = 0;
        for msg in &self.messages {
            total_chars += msg.content.as_text().chars().count();
            if let Some(thinking) = &msg.thinking {
                total_chars += thinking.chars().count();
            }
            if let Some(tool_calls) = &msg.tool_calls {
                total_chars += serde_json::to_string(tool_calls)
                    .unwrap_or_default()
                    .chars()
                    .count();
            }
        }
        (total_chars as f64 / 2.5) as u64
    }

    /// Check the token signals and summarise the history when either
    /// exceeds the limit. Idempotent; called before each model request.
    pub async fn maybe_summarise(&mut self) -> Result<()> {
        // A summary just completed; wait for the next model call to refresh
        // the provider token count before re-checking.
        if self.skip_next_check {
            self.skip_next_check = false;
            return Ok(());
        }

        let estimated = self.estimate_tokens();
        let api_exceeded = self
            .api_total_tokens
            .is_some_and(|t| t > self.token_limit);

        if estimated <= self.token_limit && !api_exceeded {
            return Ok(());
        }

        log::info!(
            "token usage - local estimate: {estimated}, provider reported: {:?}, limit: {} - summarising",
            self.api_total_tokens,
            self.token_limit,
        );

        // User messages are user intent; everything between them is
        // execution traffic and fair game for compaction.
        let user_indices: Vec<usize> = self
            .messages
            .iter()
            .enumerate()
            .filter(|(i, m)| *i > 0 && m.role == MessageRole::User)
            .map(|(i, _)| i)
            .collect();

        if user_indices.is_empty() {
            log::warn!("nothing to summarise: no user turns in history");
            return Ok(());
        }

        let mut new_messages = vec![self.messages[0].clone()];
        let mut summary_count = 0usize;

        for (i, &user_idx) in user_indices.iter().enumerate() {
            new_messages.push(self.messages[user_idx].clone());

            let end = if i + 1 < user_indices.len() {
                user_indices[i + 1]
            } else {
                self.messages.len()
            };
            let exec_slice = &self.messages[user_idx + 1..end];

            if !exec_slice.is_empty() {
                let summary_text = self.create_summary(exec_slice, i + 1).await;
                if !summary_text.is_empty() {
                    new_messages
                        .push(Message::user(format!("{SUMMARY_MARKER}\n\n{summary_text}")));
                    summary_count += 1;
                }
            }
        }

        self.messages = new_messages;
        self.skip_next_check = true;

        log::info!(
            "summary complete: local tokens {estimated} -> {}, {} user turns, {summary_count} summaries",
            self.estimate_tokens(),
            user_indices.len(),
        );
        Ok(())
    }

    /// Summarise one execution slice via a one-shot model call. Returns the
    /// rendered raw slice when the call fails.
    async fn create_summary(&self, slice: &[Message], round: usize) -> String {
        let rendered = render_slice(slice, round);

        let prompt = format!(
            "Please provide a concise summary of the following agent execution process:\n\n\
             {rendered}\n\n\
             Requirements:\n\
             1. Focus on what tasks were completed and which tools were called\n\
             2. Keep key execution results and important findings\n\
             3. Be concise and clear, within 1000 words\n\
             4. Do not include user-related content, only summarise the agent's execution process"
        );
        let request = vec![
            Message::system("You are an assistant skilled at summarising agent execution processes."),
            Message::user(prompt),
        ];

        match self.model.generate(&request, &[]).await {
            Ok(response) => response.content,
            Err(e) => {
                log::warn!("summary generation failed for round {round}: {e}");
                rendered
            }
        }
    }
}

/// Render an execution slice as plain text, used both as the summary prompt
/// body and as the fallback summary.
fn render_slice(slice: &[Message], round: usize) -> String {
    let mut out = format!("Round {round} execution process:\n\n");
    for msg in slice {
        match msg.role {
            MessageRole::Assistant => {
                out.push_str(&format!("Assistant: {}\n", msg.content.as_text()));
                if let Some(tool_calls) = &msg.tool_calls {
                    let names: Vec<&str> =
                        tool_calls.iter().map(|tc| tc.function.name.as_str()).collect();
                    out.push_str(&format!("  -> Called tools: {}\n", names.join(", ")));
                }
            }
            MessageRole::Tool => {
                out.push_str(&format!("  <- Tool returned: {}\n", msg.content.as_text()));
            }
            _ => {}
        }
    }
    out
}
