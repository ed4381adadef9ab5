//! Per-run trace logging
//!
//! [`RunLogger`] writes an append-only text trace of one agent run into the
//! session's workspace: every model request, every response and every tool
//! invocation, each entry carrying a monotonic index and a wall-clock
//! timestamp. The trace is purely observational; a failed write is logged
//! and swallowed, never aborting the run.

use crate::types::{LlmResponse, Message, ToolResult, ToolSpec};
use chrono::Local;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Append-only trace of one agent run.
pub struct RunLogger {
    workspace_dir: PathBuf,
    log_file: Option<PathBuf>,
    index: u64,
}

impl RunLogger {
    /// Create a logger writing under the given workspace directory.
    pub fn new(workspace_dir: impl Into<PathBuf>) -> Self {
        Self {
            workspace_dir: workspace_dir.into(),
            log_file: None,
            index: 0,
        }
    }

    /// Start a new run: open a fresh timestamped log file and reset the
    /// entry index.
    pub fn start_run(&mut self) {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let path = self.workspace_dir.join(format!("agent_run_{timestamp}.log"));
        self.index = 0;

        let header = format!(
            "{}\nAgent Run Log - {}\n{}\n\n",
            "=".repeat(80),
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            "=".repeat(80),
        );
        if let Err(e) = std::fs::write(&path, header) {
            log::warn!("could not create run log {}: {e}", path.display());
            self.log_file = None;
            return;
        }
        self.log_file = Some(path);
    }

    /// Path of the current log file, if one is open.
    pub fn log_file_path(&self) -> Option<&Path> {
        self.log_file.as_deref()
    }

    /// Record an outgoing model request.
    pub fn log_request(&mut self, messages: &[Message], tools: &[ToolSpec]) {
        let mut content = format!("LLM Request:\n\nMessage Count: {}\n\nMessages:\n", messages.len());

        for (i, msg) in messages.iter().enumerate() {
            content.push_str(&format!("\n--- Message {} ---\n", i + 1));
            content.push_str(&format!("Role: {:?}\n", msg.role));
            content.push_str(&format!("Content: {}\n", msg.content.as_text()));
            if let Some(thinking) = &msg.thinking {
                content.push_str(&format!("Thinking: {thinking}\n"));
            }
            if let Some(tool_calls) = &msg.tool_calls {
                content.push_str(&format!(
                    "Tool Calls: {}\n",
                    serde_json::to_string_pretty(tool_calls).unwrap_or_default()
                ));
            }
            if let Some(id) = &msg.tool_call_id {
                content.push_str(&format!("Tool Call ID: {id}\n"));
            }
        }

        if !tools.is_empty() {
            content.push_str(&format!("\nAvailable Tools: {}\n", tools.len()));
            for tool in tools {
                content.push_str(&format!("  - {}\n", tool.name));
            }
        }

        self.write_entry("REQUEST", &content);
    }

    /// Record a model response.
    pub fn log_response(&mut self, response: &LlmResponse) {
        let mut content = String::from("LLM Response:\n\n");

        if let Some(thinking) = &response.thinking {
            content.push_str(&format!("Thinking:\n{thinking}\n\n"));
        }
        content.push_str(&format!("Content:\n{}\n\n", response.content));

        if let Some(tool_calls) = &response.tool_calls {
            content.push_str(&format!("Tool Calls ({}):\n", tool_calls.len()));
            for (i, tc) in tool_calls.iter().enumerate() {
                content.push_str(&format!("\n--- Tool Call {} ---\n", i + 1));
                content.push_str(&serde_json::to_string_pretty(tc).unwrap_or_default());
                content.push('\n');
            }
        }

        content.push_str(&format!("\nFinish Reason: {}\n", response.finish_reason));
        self.write_entry("RESPONSE", &content);
    }

    /// Record one tool invocation and its outcome.
    pub fn log_tool_result(
        &mut self,
        tool_name: &str,
        arguments: &serde_json::Value,
        result: &ToolResult,
    ) {
        let mut content = format!("Tool Execution: {tool_name}\n\n");
        content.push_str(&format!(
            "Arguments:\n{}\n\n",
            serde_json::to_string_pretty(arguments).unwrap_or_default()
        ));
        content.push_str(&format!("Success: {}\n\n", result.success));

        if result.success {
            content.push_str(&format!("Result:\n{}\n", result.content));
        } else {
            content.push_str(&format!(
                "Error:\n{}\n",
                result.error.as_deref().unwrap_or("unknown error")
            ));
        }

        self.write_entry("TOOL_RESULT", &content);
    }

    fn write_entry(&mut self, kind: &str, content: &str) {
        let Some(path) = &self.log_file else {
            return;
        };
        self.index += 1;

        let entry = format!(
            "\n{}\n[{}] {}\nTimestamp: {}\n{}\n{}\n",
            "-".repeat(80),
            self.index,
            kind,
            Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            "-".repeat(80),
            content,
        );

        let write = OpenOptions::new()
            .append(true)
            .open(path)
            .and_then(|mut f| f.write_all(entry.as_bytes()));
        if let Err(e) = write {
            log::warn!("run log write failed ({}): {e}", path.display());
        }
    }
}
